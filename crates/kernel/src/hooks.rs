//! Issuance seams between modules
//!
//! The issuance module walks its registered module hooks in registration
//! order. Hooks are resolved by id through a `HookSet` built for the one
//! operation, so no module holds a reference to another.

use basket_core::{AccountId, AssetId, BasketId, ModuleId};
use rust_decimal::Decimal;
use std::fmt;

use crate::env::Env;
use crate::error::ModuleError;

/// A module that keeps its positions in step with issuance and redemption
pub trait ModuleIssuanceHook {
    fn module_id(&self) -> &ModuleId;

    /// Runs before any component moves on issue
    fn module_issue_hook(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
        quantity: Decimal,
    ) -> Result<(), ModuleError>;

    /// Runs before any component moves on redeem
    fn module_redeem_hook(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
        quantity: Decimal,
    ) -> Result<(), ModuleError>;

    /// Settle this module's external position in `component` for an issue of `quantity`
    fn component_issue_hook(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
        quantity: Decimal,
        component: &AssetId,
        is_equity: bool,
    ) -> Result<(), ModuleError>;

    /// Settle this module's external position in `component` for a redeem of `quantity`
    fn component_redeem_hook(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
        quantity: Decimal,
        component: &AssetId,
        is_equity: bool,
    ) -> Result<(), ModuleError>;
}

/// Manager-supplied validation that runs before an issue
pub trait ManagerIssuanceHook: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn invoke_pre_issue_hook(
        &self,
        env: &Env<'_>,
        basket: &BasketId,
        quantity: Decimal,
        issuer: &AccountId,
        to: &AccountId,
    ) -> Result<(), ModuleError>;
}

/// Registration surface of the issuance module
pub trait IssuanceRegistrar {
    fn issuance_module_id(&self) -> &ModuleId;

    /// Add `caller` to the basket's ordered hook list
    fn register(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
    ) -> Result<(), ModuleError>;

    /// Remove `caller` from the basket's hook list
    fn unregister(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
    ) -> Result<(), ModuleError>;
}

/// Module hooks available to one issuance operation
#[derive(Default)]
pub struct HookSet<'h> {
    hooks: Vec<&'h mut dyn ModuleIssuanceHook>,
}

impl<'h> HookSet<'h> {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn with(mut self, hook: &'h mut dyn ModuleIssuanceHook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn get(&mut self, id: &ModuleId) -> Option<&mut (dyn ModuleIssuanceHook + 'h)> {
        self.hooks
            .iter_mut()
            .find(|hook| hook.module_id() == id)
            .map(|hook| &mut **hook)
    }

    /// Hook for `id`, failing if the module is not available
    pub fn require(
        &mut self,
        id: &ModuleId,
    ) -> Result<&mut (dyn ModuleIssuanceHook + 'h), ModuleError> {
        self.get(id)
            .ok_or_else(|| ModuleError::HookUnavailable(id.clone()))
    }
}
