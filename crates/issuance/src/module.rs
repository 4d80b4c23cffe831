//! Issuance module: per-basket settings, fee updates and hook registration

use basket_bus::ProtocolEvent;
use basket_core::{AccountId, BasketId, ModuleId};
use basket_kernel::{Env, IssuanceRegistrar, ManagerIssuanceHook, ModuleError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Issuance configuration of one basket
#[derive(Debug, Clone)]
pub struct IssuanceSettings {
    pub max_manager_fee: Decimal,
    pub manager_issue_fee: Decimal,
    pub manager_redeem_fee: Decimal,
    pub fee_recipient: AccountId,
    pub manager_issuance_hook: Option<Arc<dyn ManagerIssuanceHook>>,
    /// Modules called on every issue and redeem, in registration order
    pub module_issuance_hooks: Vec<ModuleId>,
}

/// Issues and redeems baskets that carry debt positions
#[derive(Debug, Clone)]
pub struct DebtIssuanceModule {
    pub(crate) id: ModuleId,
    pub(crate) settings: HashMap<BasketId, IssuanceSettings>,
}

impl DebtIssuanceModule {
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            settings: HashMap::new(),
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn settings(&self, basket: &BasketId) -> Option<&IssuanceSettings> {
        self.settings.get(basket)
    }

    /// Registered hook modules for `basket`, in call order
    pub fn module_issuance_hooks(&self, basket: &BasketId) -> &[ModuleId] {
        self.settings
            .get(basket)
            .map(|s| s.module_issuance_hooks.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn settings_of(&self, basket: &BasketId) -> Result<&IssuanceSettings, ModuleError> {
        self.settings
            .get(basket)
            .ok_or(ModuleError::BasketNotInitialized)
    }

    fn settings_mut(&mut self, basket: &BasketId) -> Result<&mut IssuanceSettings, ModuleError> {
        self.settings
            .get_mut(basket)
            .ok_or(ModuleError::BasketNotInitialized)
    }

    // === Lifecycle ===

    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        max_manager_fee: Decimal,
        manager_issue_fee: Decimal,
        manager_redeem_fee: Decimal,
        fee_recipient: AccountId,
        manager_issuance_hook: Option<Arc<dyn ManagerIssuanceHook>>,
    ) -> Result<(), ModuleError> {
        env.only_manager(basket, caller)?;
        env.only_valid_and_pending(basket, &self.id)?;
        if manager_issue_fee > max_manager_fee {
            return Err(ModuleError::IssueFeeTooHigh);
        }
        if manager_redeem_fee > max_manager_fee {
            return Err(ModuleError::RedeemFeeTooHigh);
        }

        self.settings.insert(
            basket.clone(),
            IssuanceSettings {
                max_manager_fee,
                manager_issue_fee,
                manager_redeem_fee,
                fee_recipient,
                manager_issuance_hook,
                module_issuance_hooks: Vec::new(),
            },
        );
        env.ledger.initialize_module(basket, &self.id)?;
        env.emit(ProtocolEvent::ModuleInitialized {
            basket: basket.clone(),
            module: self.id.clone(),
        });

        info!(basket = %basket, module = %self.id, "Issuance module initialized");
        Ok(())
    }

    /// Drop settings; refused while any module is still registered
    pub fn remove_module(&mut self, env: &mut Env<'_>, basket: &BasketId) -> Result<(), ModuleError> {
        env.only_valid_and_initialized(basket, &self.id)?;
        if !self.module_issuance_hooks(basket).is_empty() {
            return Err(ModuleError::RegisteredModulesRemain);
        }
        self.settings.remove(basket);
        info!(basket = %basket, module = %self.id, "Issuance module removed");
        Ok(())
    }

    // === Manager updates ===

    pub fn update_issue_fee(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        new_fee: Decimal,
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        let settings = self.settings_mut(basket)?;
        if new_fee > settings.max_manager_fee {
            return Err(ModuleError::IssueFeeTooHigh);
        }
        if new_fee == settings.manager_issue_fee {
            return Err(ModuleError::SameIssueFee);
        }
        settings.manager_issue_fee = new_fee;
        env.emit(ProtocolEvent::IssueFeeUpdated {
            basket: basket.clone(),
            new_fee,
        });
        Ok(())
    }

    pub fn update_redeem_fee(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        new_fee: Decimal,
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        let settings = self.settings_mut(basket)?;
        if new_fee > settings.max_manager_fee {
            return Err(ModuleError::RedeemFeeTooHigh);
        }
        if new_fee == settings.manager_redeem_fee {
            return Err(ModuleError::SameRedeemFee);
        }
        settings.manager_redeem_fee = new_fee;
        env.emit(ProtocolEvent::RedeemFeeUpdated {
            basket: basket.clone(),
            new_fee,
        });
        Ok(())
    }

    pub fn update_fee_recipient(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        new_recipient: AccountId,
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        let settings = self.settings_mut(basket)?;
        if settings.fee_recipient == new_recipient {
            return Err(ModuleError::SameFeeRecipient);
        }
        settings.fee_recipient = new_recipient.clone();
        env.emit(ProtocolEvent::FeeRecipientUpdated {
            basket: basket.clone(),
            module: self.id.clone(),
            new_recipient,
        });
        Ok(())
    }
}

impl IssuanceRegistrar for DebtIssuanceModule {
    fn issuance_module_id(&self) -> &ModuleId {
        &self.id
    }

    fn register(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
    ) -> Result<(), ModuleError> {
        env.only_valid_and_initialized(basket, &self.id)?;
        env.only_module(basket, caller)?;
        let settings = self.settings_mut(basket)?;
        if settings.module_issuance_hooks.contains(caller) {
            return Err(ModuleError::ModuleAlreadyRegistered);
        }
        settings.module_issuance_hooks.push(caller.clone());
        info!(basket = %basket, module = %caller, "Issuance hook registered");
        Ok(())
    }

    fn unregister(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
    ) -> Result<(), ModuleError> {
        env.only_valid_and_initialized(basket, &self.id)?;
        let settings = self.settings_mut(basket)?;
        let Some(index) = settings.module_issuance_hooks.iter().position(|m| m == caller) else {
            return Err(ModuleError::ModuleNotRegistered);
        };
        settings.module_issuance_hooks.remove(index);
        info!(basket = %basket, module = %caller, "Issuance hook unregistered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_initialize_rejects_fee_above_max() {
        let mut fixture = Fixture::new();
        let other = BasketId::from("IDX2");
        fixture.controller.add_basket(other.clone()).unwrap();
        fixture
            .ledger
            .create_basket(basket_ledger::NewBasket {
                id: other.clone(),
                manager: manager(),
                components: vec![(eth(), dec!(1))],
                modules: vec![issuance()],
            })
            .unwrap();

        let result = fixture.run(|module, env, _| {
            module.initialize(env, &manager(), &other, dec!(0.01), dec!(0.02), Decimal::ZERO, manager(), None)
        });
        assert_eq!(result, Err(ModuleError::IssueFeeTooHigh));

        let result = fixture.run(|module, env, _| {
            module.initialize(env, &manager(), &other, dec!(0.01), Decimal::ZERO, dec!(0.02), manager(), None)
        });
        assert_eq!(result, Err(ModuleError::RedeemFeeTooHigh));
    }

    #[test]
    fn test_initialize_twice_rejected() {
        let mut fixture = Fixture::new();
        let result = fixture.run(|module, env, _| {
            module.initialize(env, &manager(), &basket(), dec!(0.1), Decimal::ZERO, Decimal::ZERO, manager(), None)
        });
        assert_eq!(result, Err(ModuleError::BasketNotPending));
    }

    #[test]
    fn test_fee_updates_validate() {
        let mut fixture = Fixture::new();

        let result = fixture.run(|module, env, _| module.update_issue_fee(env, &manager(), &basket(), dec!(0.2)));
        assert_eq!(result, Err(ModuleError::IssueFeeTooHigh));

        let result = fixture.run(|module, env, _| module.update_issue_fee(env, &manager(), &basket(), Decimal::ZERO));
        assert_eq!(result, Err(ModuleError::SameIssueFee));

        let result = fixture.run(|module, env, _| module.update_redeem_fee(env, &manager(), &basket(), Decimal::ZERO));
        assert_eq!(result, Err(ModuleError::SameRedeemFee));

        let result = fixture.run(|module, env, _| {
            module.update_fee_recipient(env, &manager(), &basket(), fee_recipient())
        });
        assert_eq!(result, Err(ModuleError::SameFeeRecipient));

        let result = fixture.run(|module, env, _| module.update_issue_fee(env, &alice(), &basket(), dec!(0.01)));
        assert_eq!(result, Err(ModuleError::OnlyManager));

        fixture
            .run(|module, env, _| module.update_fee_recipient(env, &manager(), &basket(), alice()))
            .unwrap();
        assert_eq!(fixture.module.settings(&basket()).unwrap().fee_recipient, alice());
    }

    #[test]
    fn test_registration_lifecycle() {
        let mut fixture = Fixture::new();
        assert_eq!(fixture.module.module_issuance_hooks(&basket()), &[lender()]);

        let result = fixture.run(|module, env, _| module.register(env, &lender(), &basket()));
        assert_eq!(result, Err(ModuleError::ModuleAlreadyRegistered));

        let result = fixture.run(|module, env, _| module.remove_module(env, &basket()));
        assert_eq!(result, Err(ModuleError::RegisteredModulesRemain));

        fixture
            .run(|module, env, _| module.unregister(env, &lender(), &basket()))
            .unwrap();
        let result = fixture.run(|module, env, _| module.unregister(env, &lender(), &basket()));
        assert_eq!(result, Err(ModuleError::ModuleNotRegistered));

        fixture
            .run(|module, env, _| module.remove_module(env, &basket()))
            .unwrap();
        assert!(fixture.module.settings(&basket()).is_none());
    }

    #[test]
    fn test_register_requires_initialized_caller() {
        let mut fixture = Fixture::new();
        let staking = ModuleId::from("STAKING");

        let result = fixture.run(|module, env, _| module.register(env, &staking, &basket()));
        assert_eq!(result, Err(ModuleError::OnlyModule));

        // Added but still pending is not enough
        fixture.controller.add_module(&owner(), staking.clone()).unwrap();
        fixture.ledger.add_module(&basket(), &staking).unwrap();
        let result = fixture.run(|module, env, _| module.register(env, &staking, &basket()));
        assert_eq!(result, Err(ModuleError::OnlyModule));
        assert_eq!(fixture.module.module_issuance_hooks(&basket()), &[lender()]);

        fixture.ledger.initialize_module(&basket(), &staking).unwrap();
        fixture
            .run(|module, env, _| module.register(env, &staking, &basket()))
            .unwrap();
        assert_eq!(fixture.module.module_issuance_hooks(&basket()), &[lender(), staking]);
    }
}
