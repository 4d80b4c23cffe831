//! Basket state - one basket's supply, multiplier, positions and modules

use basket_core::precise::{conservative_precise_div, conservative_precise_mul};
use basket_core::{AccountId, AssetId, BasketId, ModuleId};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::LedgerError;
use crate::position::{ComponentPosition, ExternalPosition, ModuleState, Position, PositionKind};

/// A single basket record
#[derive(Debug, Clone)]
pub struct BasketState {
    id: BasketId,
    manager: AccountId,
    total_supply: Decimal,
    position_multiplier: Decimal,
    components: Vec<AssetId>,
    positions: HashMap<AssetId, ComponentPosition>,
    modules: Vec<ModuleId>,
    module_states: HashMap<ModuleId, ModuleState>,
    /// Bottom entry is the locker; entries above it are nested hooks
    lock_stack: Vec<ModuleId>,
}

impl BasketState {
    pub(crate) fn new(id: BasketId, manager: AccountId) -> Self {
        Self {
            id,
            manager,
            total_supply: Decimal::ZERO,
            position_multiplier: Decimal::ONE,
            components: Vec::new(),
            positions: HashMap::new(),
            modules: Vec::new(),
            module_states: HashMap::new(),
            lock_stack: Vec::new(),
        }
    }

    pub fn id(&self) -> &BasketId {
        &self.id
    }

    pub fn manager(&self) -> &AccountId {
        &self.manager
    }

    pub fn total_supply(&self) -> Decimal {
        self.total_supply
    }

    pub fn position_multiplier(&self) -> Decimal {
        self.position_multiplier
    }

    pub fn components(&self) -> &[AssetId] {
        &self.components
    }

    pub fn is_component(&self, component: &AssetId) -> bool {
        self.components.contains(component)
    }

    // === Modules ===

    /// Modules in the order they were added
    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    pub fn module_state(&self, module: &ModuleId) -> Option<ModuleState> {
        self.module_states.get(module).copied()
    }

    pub fn is_initialized_module(&self, module: &ModuleId) -> bool {
        self.module_state(module) == Some(ModuleState::Initialized)
    }

    pub fn is_pending_module(&self, module: &ModuleId) -> bool {
        self.module_state(module) == Some(ModuleState::Pending)
    }

    // === Guard ===

    pub fn is_locked(&self) -> bool {
        !self.lock_stack.is_empty()
    }

    /// Module that holds the lock
    pub fn locker(&self) -> Option<&ModuleId> {
        self.lock_stack.first()
    }

    /// Innermost module currently executing under the lock
    pub fn active_module(&self) -> Option<&ModuleId> {
        self.lock_stack.last()
    }

    // === Position reads ===

    pub fn default_position_real_unit(&self, component: &AssetId) -> Result<Decimal, LedgerError> {
        let virtual_unit = self
            .positions
            .get(component)
            .map(|p| p.default_virtual_unit)
            .unwrap_or(Decimal::ZERO);
        self.to_real_unit(virtual_unit)
    }

    pub fn external_position_real_unit(
        &self,
        component: &AssetId,
        module: &ModuleId,
    ) -> Result<Decimal, LedgerError> {
        let virtual_unit = self
            .positions
            .get(component)
            .map(|p| p.external_virtual_unit(module))
            .unwrap_or(Decimal::ZERO);
        self.to_real_unit(virtual_unit)
    }

    pub fn external_position_modules(&self, component: &AssetId) -> &[ModuleId] {
        self.positions
            .get(component)
            .map(|p| p.external_modules.as_slice())
            .unwrap_or(&[])
    }

    pub fn external_position_data(&self, component: &AssetId, module: &ModuleId) -> &[u8] {
        self.positions
            .get(component)
            .and_then(|p| p.external_positions.get(module))
            .map(|p| p.data.as_slice())
            .unwrap_or(&[])
    }

    pub fn component_position(&self, component: &AssetId) -> Option<&ComponentPosition> {
        self.positions.get(component)
    }

    /// All nonzero positions: per component, the default unit then each external unit
    pub fn positions(&self) -> Result<Vec<Position>, LedgerError> {
        let mut out = Vec::new();
        for component in &self.components {
            let Some(position) = self.positions.get(component) else {
                continue;
            };

            if !position.default_virtual_unit.is_zero() {
                out.push(Position {
                    component: component.clone(),
                    module: None,
                    unit: self.to_real_unit(position.default_virtual_unit)?,
                    kind: PositionKind::Default,
                    data: Vec::new(),
                });
            }

            for module in &position.external_modules {
                if let Some(external) = position.external_positions.get(module) {
                    out.push(Position {
                        component: component.clone(),
                        module: Some(module.clone()),
                        unit: self.to_real_unit(external.virtual_unit)?,
                        kind: PositionKind::External,
                        data: external.data.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    // === Unit conversion ===

    pub fn to_real_unit(&self, virtual_unit: Decimal) -> Result<Decimal, LedgerError> {
        Ok(conservative_precise_mul(virtual_unit, self.position_multiplier)?)
    }

    pub(crate) fn to_virtual_unit(&self, real_unit: Decimal) -> Result<Decimal, LedgerError> {
        let virtual_unit = conservative_precise_div(real_unit, self.position_multiplier)?;

        if real_unit > Decimal::ZERO && virtual_unit.is_zero() {
            return Err(LedgerError::RealToVirtualInvalid);
        }
        if real_unit > Decimal::ZERO && self.to_real_unit(virtual_unit)?.is_zero() {
            return Err(LedgerError::VirtualToRealInvalid);
        }

        Ok(virtual_unit)
    }

    // === Mutations (authorization is checked by the ledger) ===

    pub(crate) fn set_supply(&mut self, supply: Decimal) {
        self.total_supply = supply;
    }

    pub(crate) fn set_position_multiplier(&mut self, multiplier: Decimal) {
        self.position_multiplier = multiplier;
    }

    pub(crate) fn set_module_state(&mut self, module: &ModuleId, state: ModuleState) {
        if !self.modules.contains(module) {
            self.modules.push(module.clone());
        }
        self.module_states.insert(module.clone(), state);
    }

    pub(crate) fn drop_module(&mut self, module: &ModuleId) {
        self.modules.retain(|m| m != module);
        self.module_states.remove(module);
    }

    pub(crate) fn lock_stack_mut(&mut self) -> &mut Vec<ModuleId> {
        &mut self.lock_stack
    }

    pub(crate) fn add_component(&mut self, component: &AssetId) {
        if !self.is_component(component) {
            self.components.push(component.clone());
            self.positions.entry(component.clone()).or_default();
        }
    }

    pub(crate) fn remove_component(&mut self, component: &AssetId) {
        self.components.retain(|c| c != component);
        self.positions.remove(component);
    }

    pub(crate) fn set_default_virtual_unit(&mut self, component: &AssetId, virtual_unit: Decimal) {
        if let Some(position) = self.positions.get_mut(component) {
            position.default_virtual_unit = virtual_unit;
        }
    }

    pub(crate) fn position_mut(&mut self, component: &AssetId) -> Option<&mut ComponentPosition> {
        self.positions.get_mut(component)
    }

    pub(crate) fn set_external(
        &mut self,
        component: &AssetId,
        module: &ModuleId,
        virtual_unit: Decimal,
        data: Vec<u8>,
    ) {
        if let Some(position) = self.positions.get_mut(component) {
            position.attach_module(module);
            position
                .external_positions
                .insert(module.clone(), ExternalPosition { virtual_unit, data });
        }
    }

    /// Smallest nonzero absolute virtual unit across all positions
    pub(crate) fn min_abs_virtual_unit(&self) -> Option<Decimal> {
        self.positions
            .values()
            .flat_map(|p| {
                std::iter::once(p.default_virtual_unit)
                    .chain(p.external_positions.values().map(|e| e.virtual_unit))
            })
            .filter(|u| !u.is_zero())
            .map(|u| u.abs())
            .min()
    }
}
