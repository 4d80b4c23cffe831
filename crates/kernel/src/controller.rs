//! Controller - protocol-wide registry and fee table

use basket_core::{AccountId, BasketId, ModuleId};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

use crate::config::ProtocolConfig;
use crate::error::ModuleError;

/// Protocol owner, enabled modules, registered baskets and module fees
#[derive(Debug, Clone)]
pub struct Controller {
    owner: AccountId,
    fee_recipient: AccountId,
    modules: Vec<ModuleId>,
    baskets: Vec<BasketId>,
    /// (module, fee index) -> fee fraction
    fees: HashMap<(ModuleId, usize), Decimal>,
}

impl Controller {
    pub fn new(owner: AccountId, fee_recipient: AccountId) -> Self {
        Self {
            owner,
            fee_recipient,
            modules: Vec::new(),
            baskets: Vec::new(),
            fees: HashMap::new(),
        }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.owner.clone(), config.fee_recipient.clone())
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn fee_recipient(&self) -> &AccountId {
        &self.fee_recipient
    }

    pub fn only_owner(&self, caller: &AccountId) -> Result<(), ModuleError> {
        if caller != &self.owner {
            return Err(ModuleError::OnlyOwner);
        }
        Ok(())
    }

    // === Modules ===

    pub fn add_module(&mut self, caller: &AccountId, module: ModuleId) -> Result<(), ModuleError> {
        self.only_owner(caller)?;
        if self.is_module(&module) {
            return Err(ModuleError::ModuleExists);
        }
        info!(module = %module, "Module enabled on controller");
        self.modules.push(module);
        Ok(())
    }

    pub fn remove_module(&mut self, caller: &AccountId, module: &ModuleId) -> Result<(), ModuleError> {
        self.only_owner(caller)?;
        if !self.is_module(module) {
            return Err(ModuleError::ModuleMissing);
        }
        self.modules.retain(|m| m != module);
        self.fees.retain(|(m, _), _| m != module);
        info!(module = %module, "Module disabled on controller");
        Ok(())
    }

    pub fn is_module(&self, module: &ModuleId) -> bool {
        self.modules.contains(module)
    }

    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    // === Baskets ===

    /// Register a basket created by the factory
    pub fn add_basket(&mut self, basket: BasketId) -> Result<(), ModuleError> {
        if self.is_basket(&basket) {
            return Err(ModuleError::BasketExists);
        }
        self.baskets.push(basket);
        Ok(())
    }

    pub fn is_basket(&self, basket: &BasketId) -> bool {
        self.baskets.contains(basket)
    }

    pub fn baskets(&self) -> &[BasketId] {
        &self.baskets
    }

    // === Fees ===

    pub fn add_fee(
        &mut self,
        caller: &AccountId,
        module: &ModuleId,
        index: usize,
        fee: Decimal,
    ) -> Result<(), ModuleError> {
        self.only_owner(caller)?;
        check_fraction(fee)?;
        let key = (module.clone(), index);
        if self.fees.contains_key(&key) {
            return Err(ModuleError::FeeTypeExists);
        }
        self.fees.insert(key, fee);
        Ok(())
    }

    pub fn edit_fee(
        &mut self,
        caller: &AccountId,
        module: &ModuleId,
        index: usize,
        fee: Decimal,
    ) -> Result<(), ModuleError> {
        self.only_owner(caller)?;
        check_fraction(fee)?;
        match self.fees.get_mut(&(module.clone(), index)) {
            Some(slot) => {
                *slot = fee;
                Ok(())
            }
            None => Err(ModuleError::FeeTypeMissing),
        }
    }

    pub fn edit_fee_recipient(
        &mut self,
        caller: &AccountId,
        recipient: AccountId,
    ) -> Result<(), ModuleError> {
        self.only_owner(caller)?;
        self.fee_recipient = recipient;
        Ok(())
    }

    /// Protocol fee for `(module, index)`, zero if never set
    pub fn module_fee(&self, module: &ModuleId, index: usize) -> Decimal {
        self.fees
            .get(&(module.clone(), index))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

fn check_fraction(fee: Decimal) -> Result<(), ModuleError> {
    if fee < Decimal::ZERO || fee > Decimal::ONE {
        return Err(ModuleError::InvalidFeePercentage(fee));
    }
    Ok(())
}
