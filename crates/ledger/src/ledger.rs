//! Basket ledger - arena of baskets and every authorized mutation on them

use basket_core::precise::{conservative_precise_mul, mul_div_down};
use basket_core::{AccountId, AssetId, BasketId, ModuleId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::basket::BasketState;
use crate::error::LedgerError;
use crate::position::ModuleState;

/// Parameters for a new basket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBasket {
    pub id: BasketId,
    pub manager: AccountId,
    /// Initial default units per whole token
    pub components: Vec<(AssetId, Decimal)>,
    /// Modules added in `Pending` state
    pub modules: Vec<ModuleId>,
}

/// Arena of basket records
#[derive(Debug, Clone, Default)]
pub struct BasketLedger {
    baskets: Vec<BasketState>,
    index: HashMap<BasketId, usize>,
}

impl BasketLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new basket with positive default units and pending modules
    pub fn create_basket(&mut self, params: NewBasket) -> Result<(), LedgerError> {
        if self.index.contains_key(&params.id) {
            return Err(LedgerError::BasketExists(params.id));
        }
        if params.components.is_empty() {
            return Err(LedgerError::NoComponents);
        }
        if params.modules.is_empty() {
            return Err(LedgerError::NoModules);
        }

        let mut basket = BasketState::new(params.id.clone(), params.manager);
        for (component, unit) in &params.components {
            if basket.is_component(component) {
                return Err(LedgerError::DuplicateComponent(component.clone()));
            }
            if *unit <= Decimal::ZERO {
                return Err(LedgerError::NonPositiveUnit(component.clone()));
            }
            basket.add_component(component);
            basket.set_default_virtual_unit(component, *unit);
        }
        for module in &params.modules {
            if basket.module_state(module).is_some() {
                return Err(LedgerError::ModuleAlreadyAdded(module.clone()));
            }
            basket.set_module_state(module, ModuleState::Pending);
        }

        debug!(basket = %params.id, components = params.components.len(), "Basket created");
        self.index.insert(params.id, self.baskets.len());
        self.baskets.push(basket);
        Ok(())
    }

    pub fn contains(&self, id: &BasketId) -> bool {
        self.index.contains_key(id)
    }

    pub fn basket(&self, id: &BasketId) -> Result<&BasketState, LedgerError> {
        self.index
            .get(id)
            .map(|&i| &self.baskets[i])
            .ok_or_else(|| LedgerError::BasketNotFound(id.clone()))
    }

    fn basket_mut(&mut self, id: &BasketId) -> Result<&mut BasketState, LedgerError> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.baskets[i]),
            None => Err(LedgerError::BasketNotFound(id.clone())),
        }
    }

    pub fn baskets(&self) -> impl Iterator<Item = &BasketState> {
        self.baskets.iter()
    }

    /// Check that `module` may act on the basket right now: it must be
    /// initialized, and if the basket is locked it must be the active module.
    pub fn ensure_module(&self, id: &BasketId, module: &ModuleId) -> Result<(), LedgerError> {
        let basket = self.basket(id)?;
        if !basket.is_initialized_module(module) {
            return Err(LedgerError::ModuleNotInitialized(module.clone()));
        }
        if let Some(active) = basket.active_module() {
            if active != module {
                return Err(LedgerError::LockedByOther {
                    locker: active.clone(),
                    caller: module.clone(),
                });
            }
        }
        Ok(())
    }

    fn authorized(
        &mut self,
        id: &BasketId,
        module: &ModuleId,
    ) -> Result<&mut BasketState, LedgerError> {
        self.ensure_module(id, module)?;
        self.basket_mut(id)
    }

    fn unlocked(&mut self, id: &BasketId) -> Result<&mut BasketState, LedgerError> {
        let basket = self.basket_mut(id)?;
        if let Some(locker) = basket.locker() {
            return Err(LedgerError::Locked {
                locker: locker.clone(),
            });
        }
        Ok(basket)
    }

    // === Module lifecycle ===

    /// Add a module in `Pending` state (manager-gated by the caller)
    pub fn add_module(&mut self, id: &BasketId, module: &ModuleId) -> Result<(), LedgerError> {
        let basket = self.unlocked(id)?;
        if basket.module_state(module).is_some() {
            return Err(LedgerError::ModuleAlreadyAdded(module.clone()));
        }
        basket.set_module_state(module, ModuleState::Pending);
        Ok(())
    }

    /// Move a module from `Pending` to `Initialized`
    pub fn initialize_module(
        &mut self,
        id: &BasketId,
        module: &ModuleId,
    ) -> Result<(), LedgerError> {
        let basket = self.unlocked(id)?;
        if !basket.is_pending_module(module) {
            return Err(LedgerError::ModuleNotPending(module.clone()));
        }
        basket.set_module_state(module, ModuleState::Initialized);
        debug!(basket = %id, module = %module, "Module initialized");
        Ok(())
    }

    /// Drop an initialized module from the basket
    pub fn remove_module(&mut self, id: &BasketId, module: &ModuleId) -> Result<(), LedgerError> {
        let basket = self.unlocked(id)?;
        if !basket.is_initialized_module(module) {
            return Err(LedgerError::ModuleNotAdded(module.clone()));
        }
        basket.drop_module(module);
        debug!(basket = %id, module = %module, "Module removed");
        Ok(())
    }

    /// Drop a module that never initialized
    pub fn remove_pending_module(
        &mut self,
        id: &BasketId,
        module: &ModuleId,
    ) -> Result<(), LedgerError> {
        let basket = self.unlocked(id)?;
        if !basket.is_pending_module(module) {
            return Err(LedgerError::ModuleNotPending(module.clone()));
        }
        basket.drop_module(module);
        Ok(())
    }

    // === In-progress guard ===

    pub fn lock(&mut self, id: &BasketId, module: &ModuleId) -> Result<(), LedgerError> {
        let basket = self.basket_mut(id)?;
        if !basket.is_initialized_module(module) {
            return Err(LedgerError::ModuleNotInitialized(module.clone()));
        }
        if let Some(locker) = basket.locker() {
            return Err(LedgerError::Locked {
                locker: locker.clone(),
            });
        }
        basket.lock_stack_mut().push(module.clone());
        Ok(())
    }

    pub fn unlock(&mut self, id: &BasketId, module: &ModuleId) -> Result<(), LedgerError> {
        let basket = self.basket_mut(id)?;
        let stack = basket.lock_stack_mut();
        if stack.is_empty() {
            return Err(LedgerError::NotLocked);
        }
        if stack.len() != 1 || &stack[0] != module {
            return Err(LedgerError::NotLocker);
        }
        stack.clear();
        Ok(())
    }

    /// Hand control from the active module `caller` to `callee` for a nested hook
    pub fn enter_hook(
        &mut self,
        id: &BasketId,
        caller: &ModuleId,
        callee: &ModuleId,
    ) -> Result<(), LedgerError> {
        let basket = self.basket_mut(id)?;
        match basket.active_module() {
            None => return Err(LedgerError::NotLocked),
            Some(active) if active != caller => {
                return Err(LedgerError::HookNotOwned {
                    active: active.clone(),
                    caller: caller.clone(),
                })
            }
            Some(_) => {}
        }
        if !basket.is_initialized_module(callee) {
            return Err(LedgerError::ModuleNotInitialized(callee.clone()));
        }
        basket.lock_stack_mut().push(callee.clone());
        Ok(())
    }

    /// Return control from hook `callee` to the module that entered it
    pub fn exit_hook(&mut self, id: &BasketId, callee: &ModuleId) -> Result<(), LedgerError> {
        let basket = self.basket_mut(id)?;
        let stack = basket.lock_stack_mut();
        if stack.len() < 2 || stack.last() != Some(callee) {
            return Err(LedgerError::NotLocker);
        }
        stack.pop();
        Ok(())
    }

    // === Supply ===

    pub fn increase_supply(
        &mut self,
        id: &BasketId,
        module: &ModuleId,
        quantity: Decimal,
    ) -> Result<(), LedgerError> {
        let basket = self.authorized(id, module)?;
        let supply = basket.total_supply() + quantity;
        basket.set_supply(supply);
        Ok(())
    }

    pub fn decrease_supply(
        &mut self,
        id: &BasketId,
        module: &ModuleId,
        quantity: Decimal,
    ) -> Result<(), LedgerError> {
        let basket = self.authorized(id, module)?;
        if quantity > basket.total_supply() {
            return Err(LedgerError::InsufficientSupply {
                supply: basket.total_supply(),
                burn: quantity,
            });
        }
        let supply = basket.total_supply() - quantity;
        basket.set_supply(supply);
        Ok(())
    }

    // === Positions ===

    /// Set the default (custodied) real unit of `component`.
    ///
    /// The component joins the basket on its first positive unit and leaves
    /// when the unit returns to zero, unless external positions still hold it.
    pub fn edit_default_position_unit(
        &mut self,
        id: &BasketId,
        module: &ModuleId,
        component: &AssetId,
        real_unit: Decimal,
    ) -> Result<(), LedgerError> {
        if real_unit < Decimal::ZERO {
            return Err(LedgerError::NegativeDefaultUnit(real_unit));
        }
        let basket = self.authorized(id, module)?;
        let virtual_unit = basket.to_virtual_unit(real_unit)?;

        let has_default = !basket.default_position_real_unit(component)?.is_zero();
        let has_external = !basket.external_position_modules(component).is_empty();

        if !has_default && real_unit > Decimal::ZERO && !has_external {
            basket.add_component(component);
        } else if has_default && real_unit.is_zero() && !has_external {
            basket.remove_component(component);
        }
        basket.set_default_virtual_unit(component, virtual_unit);

        debug!(basket = %id, component = %component, unit = %real_unit, "Default position edited");
        Ok(())
    }

    /// Set the external real unit that `position_module` holds in `component`.
    ///
    /// A nonzero unit attaches the owner (and the component if needed). A
    /// zero unit detaches it and drops the component when nothing else holds it.
    pub fn edit_external_position_unit(
        &mut self,
        id: &BasketId,
        module: &ModuleId,
        component: &AssetId,
        position_module: &ModuleId,
        real_unit: Decimal,
        data: Vec<u8>,
    ) -> Result<(), LedgerError> {
        let basket = self.authorized(id, module)?;

        if !real_unit.is_zero() {
            let virtual_unit = basket.to_virtual_unit(real_unit)?;
            basket.add_component(component);
            basket.set_external(component, position_module, virtual_unit, data);
        } else {
            if !data.is_empty() {
                return Err(LedgerError::PassedDataMustBeNull);
            }
            if !basket.external_position_real_unit(component, position_module)?.is_zero() {
                let modules = basket.external_position_modules(component);
                let default_is_zero = basket.default_position_real_unit(component)?.is_zero();
                if default_is_zero && modules.len() == 1 {
                    if &modules[0] != position_module {
                        return Err(LedgerError::ExternalPositionsMustBeZero);
                    }
                    basket.remove_component(component);
                } else if let Some(position) = basket.position_mut(component) {
                    position.detach_module(position_module);
                }
            }
        }

        debug!(
            basket = %id,
            component = %component,
            module = %position_module,
            unit = %real_unit,
            "External position edited"
        );
        Ok(())
    }

    /// Rescale the multiplier by `old_supply / new_supply`, rounded down.
    ///
    /// Fails if any live position would round to a zero real unit.
    pub fn edit_position_multiplier(
        &mut self,
        id: &BasketId,
        module: &ModuleId,
        old_supply: Decimal,
        new_supply: Decimal,
    ) -> Result<Decimal, LedgerError> {
        if old_supply <= Decimal::ZERO || new_supply <= Decimal::ZERO {
            return Err(LedgerError::InvalidSupply {
                old: old_supply,
                new: new_supply,
            });
        }
        let basket = self.authorized(id, module)?;
        let multiplier = mul_div_down(basket.position_multiplier(), old_supply, new_supply)?;
        if multiplier <= Decimal::ZERO {
            return Err(LedgerError::MultiplierTooSmall);
        }

        if let Some(min_virtual) = basket.min_abs_virtual_unit() {
            if conservative_precise_mul(min_virtual, multiplier)? <= Decimal::ZERO {
                return Err(LedgerError::MultiplierTooSmall);
            }
        }

        basket.set_position_multiplier(multiplier);
        debug!(basket = %id, multiplier = %multiplier, "Position multiplier edited");
        Ok(multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionKind;
    use rust_decimal_macros::dec;

    fn basket_id() -> BasketId {
        BasketId::from("ETH2X")
    }

    fn leverage() -> ModuleId {
        ModuleId::from("LEVERAGE")
    }

    fn issuance() -> ModuleId {
        ModuleId::from("ISSUANCE")
    }

    fn ceth() -> AssetId {
        AssetId::from("CETH")
    }

    fn usdc() -> AssetId {
        AssetId::from("USDC")
    }

    fn setup() -> BasketLedger {
        let mut ledger = BasketLedger::new();
        ledger
            .create_basket(NewBasket {
                id: basket_id(),
                manager: AccountId::from("MANAGER"),
                components: vec![(ceth(), dec!(1))],
                modules: vec![leverage(), issuance()],
            })
            .unwrap();
        ledger.initialize_module(&basket_id(), &leverage()).unwrap();
        ledger.initialize_module(&basket_id(), &issuance()).unwrap();
        ledger
    }

    #[test]
    fn test_create_basket_validation() {
        let mut ledger = setup();
        let dup = ledger.create_basket(NewBasket {
            id: basket_id(),
            manager: AccountId::from("MANAGER"),
            components: vec![(ceth(), dec!(1))],
            modules: vec![leverage()],
        });
        assert!(matches!(dup, Err(LedgerError::BasketExists(_))));

        let zero = ledger.create_basket(NewBasket {
            id: BasketId::from("OTHER"),
            manager: AccountId::from("MANAGER"),
            components: vec![(ceth(), Decimal::ZERO)],
            modules: vec![leverage()],
        });
        assert!(matches!(zero, Err(LedgerError::NonPositiveUnit(_))));

        let repeated = ledger.create_basket(NewBasket {
            id: BasketId::from("OTHER"),
            manager: AccountId::from("MANAGER"),
            components: vec![(ceth(), dec!(1)), (ceth(), dec!(2))],
            modules: vec![leverage()],
        });
        assert!(matches!(repeated, Err(LedgerError::DuplicateComponent(_))));
    }

    #[test]
    fn test_pending_module_cannot_write() {
        let mut ledger = BasketLedger::new();
        ledger
            .create_basket(NewBasket {
                id: basket_id(),
                manager: AccountId::from("MANAGER"),
                components: vec![(ceth(), dec!(1))],
                modules: vec![leverage()],
            })
            .unwrap();

        let result = ledger.edit_default_position_unit(&basket_id(), &leverage(), &ceth(), dec!(2));
        assert_eq!(result, Err(LedgerError::ModuleNotInitialized(leverage())));
    }

    #[test]
    fn test_default_position_add_and_remove_component() {
        let mut ledger = setup();
        ledger
            .edit_default_position_unit(&basket_id(), &leverage(), &usdc(), dec!(5))
            .unwrap();
        let basket = ledger.basket(&basket_id()).unwrap();
        assert_eq!(basket.components(), &[ceth(), usdc()]);

        ledger
            .edit_default_position_unit(&basket_id(), &leverage(), &usdc(), Decimal::ZERO)
            .unwrap();
        let basket = ledger.basket(&basket_id()).unwrap();
        assert_eq!(basket.components(), &[ceth()]);
    }

    #[test]
    fn test_external_position_lifecycle() {
        let mut ledger = setup();
        ledger
            .edit_external_position_unit(&basket_id(), &leverage(), &usdc(), &leverage(), dec!(-600), vec![])
            .unwrap();

        let basket = ledger.basket(&basket_id()).unwrap();
        assert!(basket.is_component(&usdc()));
        assert_eq!(basket.external_position_modules(&usdc()), &[leverage()]);
        assert_eq!(
            basket.external_position_real_unit(&usdc(), &leverage()).unwrap(),
            dec!(-600)
        );

        let positions = basket.positions().unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[1].kind, PositionKind::External);

        ledger
            .edit_external_position_unit(&basket_id(), &leverage(), &usdc(), &leverage(), Decimal::ZERO, vec![])
            .unwrap();
        let basket = ledger.basket(&basket_id()).unwrap();
        assert!(!basket.is_component(&usdc()));
    }

    #[test]
    fn test_external_zero_with_data_rejected() {
        let mut ledger = setup();
        let result = ledger.edit_external_position_unit(
            &basket_id(),
            &leverage(),
            &usdc(),
            &leverage(),
            Decimal::ZERO,
            vec![1],
        );
        assert_eq!(result, Err(LedgerError::PassedDataMustBeNull));
    }

    #[test]
    fn test_external_keeps_component_with_default() {
        let mut ledger = setup();
        ledger
            .edit_external_position_unit(&basket_id(), &leverage(), &ceth(), &leverage(), dec!(2), vec![])
            .unwrap();
        ledger
            .edit_external_position_unit(&basket_id(), &leverage(), &ceth(), &leverage(), Decimal::ZERO, vec![])
            .unwrap();

        let basket = ledger.basket(&basket_id()).unwrap();
        assert!(basket.is_component(&ceth()));
        assert!(basket.external_position_modules(&ceth()).is_empty());
        assert_eq!(basket.default_position_real_unit(&ceth()).unwrap(), dec!(1));
    }

    #[test]
    fn test_position_multiplier_scales_real_units() {
        let mut ledger = setup();
        let multiplier = ledger
            .edit_position_multiplier(&basket_id(), &issuance(), dec!(100), dec!(102))
            .unwrap();
        assert_eq!(multiplier, dec!(0.980392156862745098));

        let basket = ledger.basket(&basket_id()).unwrap();
        assert_eq!(
            basket.default_position_real_unit(&ceth()).unwrap(),
            dec!(0.980392156862745098)
        );
    }

    #[test]
    fn test_position_multiplier_too_small() {
        let mut ledger = setup();
        ledger
            .edit_default_position_unit(&basket_id(), &leverage(), &usdc(), dec!(0.000000000000000001))
            .unwrap();
        let result = ledger.edit_position_multiplier(&basket_id(), &issuance(), dec!(1), dec!(3));
        assert_eq!(result, Err(LedgerError::MultiplierTooSmall));
    }

    #[test]
    fn test_real_to_virtual_conversion_invalid() {
        let mut ledger = setup();
        // Supply shrinks without a burn: multiplier grows to 2.5
        ledger
            .edit_position_multiplier(&basket_id(), &issuance(), dec!(1), dec!(0.4))
            .unwrap();
        let result = ledger.edit_default_position_unit(
            &basket_id(),
            &leverage(),
            &usdc(),
            dec!(0.000000000000000001),
        );
        assert_eq!(result, Err(LedgerError::RealToVirtualInvalid));
    }

    #[test]
    fn test_virtual_to_real_conversion_invalid() {
        let mut ledger = setup();
        ledger
            .edit_position_multiplier(&basket_id(), &issuance(), dec!(2), dec!(5))
            .unwrap();
        // 1e-18 / 0.4 floors to 2e-18, and 2e-18 * 0.4 floors to zero
        let result = ledger.edit_default_position_unit(
            &basket_id(),
            &leverage(),
            &usdc(),
            dec!(0.000000000000000001),
        );
        assert_eq!(result, Err(LedgerError::VirtualToRealInvalid));
    }

    #[test]
    fn test_lock_and_hook_stack() {
        let mut ledger = setup();
        ledger.lock(&basket_id(), &issuance()).unwrap();

        // Another module cannot write while the basket is locked
        let blocked = ledger.edit_default_position_unit(&basket_id(), &leverage(), &usdc(), dec!(1));
        assert!(matches!(blocked, Err(LedgerError::LockedByOther { .. })));

        // The locker hands control to a hook
        ledger.enter_hook(&basket_id(), &issuance(), &leverage()).unwrap();
        ledger
            .edit_default_position_unit(&basket_id(), &leverage(), &usdc(), dec!(1))
            .unwrap();
        let outer = ledger.edit_default_position_unit(&basket_id(), &issuance(), &usdc(), dec!(2));
        assert!(matches!(outer, Err(LedgerError::LockedByOther { .. })));
        ledger.exit_hook(&basket_id(), &leverage()).unwrap();

        assert_eq!(ledger.unlock(&basket_id(), &leverage()), Err(LedgerError::NotLocker));
        ledger.unlock(&basket_id(), &issuance()).unwrap();
        assert_eq!(ledger.unlock(&basket_id(), &issuance()), Err(LedgerError::NotLocked));
    }

    #[test]
    fn test_double_lock_rejected() {
        let mut ledger = setup();
        ledger.lock(&basket_id(), &issuance()).unwrap();
        let again = ledger.lock(&basket_id(), &leverage());
        assert_eq!(again, Err(LedgerError::Locked { locker: issuance() }));
    }

    #[test]
    fn test_module_lifecycle() {
        let mut ledger = setup();
        let fee = ModuleId::from("STREAMING_FEE");
        ledger.add_module(&basket_id(), &fee).unwrap();
        assert_eq!(
            ledger.add_module(&basket_id(), &fee),
            Err(LedgerError::ModuleAlreadyAdded(fee.clone()))
        );
        assert_eq!(
            ledger.remove_module(&basket_id(), &fee),
            Err(LedgerError::ModuleNotAdded(fee.clone()))
        );
        ledger.initialize_module(&basket_id(), &fee).unwrap();
        ledger.remove_module(&basket_id(), &fee).unwrap();

        let basket = ledger.basket(&basket_id()).unwrap();
        assert_eq!(basket.modules(), &[leverage(), issuance()]);
    }

    #[test]
    fn test_supply_changes_are_module_gated() {
        let mut ledger = setup();
        ledger.increase_supply(&basket_id(), &issuance(), dec!(10)).unwrap();
        ledger.decrease_supply(&basket_id(), &issuance(), dec!(4)).unwrap();
        assert_eq!(ledger.basket(&basket_id()).unwrap().total_supply(), dec!(6));

        let stranger = ModuleId::from("STRANGER");
        assert!(ledger.increase_supply(&basket_id(), &stranger, dec!(1)).is_err());
        assert!(matches!(
            ledger.decrease_supply(&basket_id(), &issuance(), dec!(7)),
            Err(LedgerError::InsufficientSupply { .. })
        ));
    }
}
