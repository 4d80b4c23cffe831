//! Module context - protocol state borrowed for one operation
//!
//! An `Env` is built by the transaction facade and handed to a module. It
//! carries every collaborator a module may touch, plus the clock and the
//! event buffer that is published only if the operation commits.

use basket_bus::ProtocolEvent;
use basket_core::{AccountId, AssetId, BasketId, ModuleId, TokenBook};
use basket_integrations::{ExchangeRegistry, IntegrationRegistry, MoneyMarket, TradeCall};
use basket_ledger::{calculate_default_edit_position_unit, BasketLedger, BasketState};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::controller::Controller;
use crate::error::ModuleError;

/// Borrowed protocol state for one module operation
pub struct Env<'a> {
    pub controller: &'a Controller,
    pub ledger: &'a mut BasketLedger,
    pub tokens: &'a mut TokenBook,
    pub money_market: &'a mut dyn MoneyMarket,
    pub exchanges: &'a mut ExchangeRegistry,
    pub integrations: &'a IntegrationRegistry,
    pub now: DateTime<Utc>,
    pub events: &'a mut Vec<ProtocolEvent>,
}

impl<'a> Env<'a> {
    // === Reads ===

    pub fn basket(&self, basket: &BasketId) -> Result<&BasketState, ModuleError> {
        Ok(self.ledger.basket(basket)?)
    }

    pub fn total_supply(&self, basket: &BasketId) -> Result<Decimal, ModuleError> {
        Ok(self.basket(basket)?.total_supply())
    }

    /// Balance of `asset` custodied by the basket
    pub fn balance_of(&self, basket: &BasketId, asset: &AssetId) -> Decimal {
        self.tokens.balance_of(asset, &basket.account())
    }

    // === Authorization ===

    /// Caller must manage a controller-registered basket
    pub fn only_manager(&self, basket: &BasketId, caller: &AccountId) -> Result<(), ModuleError> {
        if !self.controller.is_basket(basket) {
            return Err(ModuleError::InvalidBasket);
        }
        if self.basket(basket)?.manager() != caller {
            return Err(ModuleError::OnlyManager);
        }
        Ok(())
    }

    /// Basket is registered and `module` is initialized on it
    pub fn only_valid_and_initialized(
        &self,
        basket: &BasketId,
        module: &ModuleId,
    ) -> Result<(), ModuleError> {
        if !self.controller.is_basket(basket) || !self.basket(basket)?.is_initialized_module(module)
        {
            return Err(ModuleError::BasketNotInitialized);
        }
        Ok(())
    }

    /// Basket is registered and `module` is waiting to initialize on it
    pub fn only_valid_and_pending(
        &self,
        basket: &BasketId,
        module: &ModuleId,
    ) -> Result<(), ModuleError> {
        if !self.controller.is_basket(basket) || !self.basket(basket)?.is_pending_module(module) {
            return Err(ModuleError::BasketNotPending);
        }
        Ok(())
    }

    /// Manager-gated operation on a basket where `module` is initialized
    pub fn only_manager_and_valid(
        &self,
        basket: &BasketId,
        caller: &AccountId,
        module: &ModuleId,
    ) -> Result<(), ModuleError> {
        self.only_manager(basket, caller)?;
        self.only_valid_and_initialized(basket, module)
    }

    /// Calling module must be initialized on the basket and enabled on the controller
    pub fn only_module(&self, basket: &BasketId, caller: &ModuleId) -> Result<(), ModuleError> {
        if !self.basket(basket)?.is_initialized_module(caller) {
            return Err(ModuleError::OnlyModule);
        }
        if !self.controller.is_module(caller) {
            return Err(ModuleError::ModuleNotEnabled);
        }
        Ok(())
    }

    /// `module` may act on the basket right now
    pub fn ensure_module(&self, basket: &BasketId, module: &ModuleId) -> Result<(), ModuleError> {
        Ok(self.ledger.ensure_module(basket, module)?)
    }

    // === In-progress guard ===

    /// Run `f` with the basket locked by `module`
    pub fn guarded<T, F>(&mut self, basket: &BasketId, module: &ModuleId, f: F) -> Result<T, ModuleError>
    where
        F: FnOnce(&mut Self) -> Result<T, ModuleError>,
    {
        self.ledger.lock(basket, module)?;
        let result = f(self);
        let released = self.ledger.unlock(basket, module);
        let value = result?;
        released?;
        Ok(value)
    }

    /// Run `f` as a hook of `callee`, entered by the active module `caller`
    pub fn with_hook<T, F>(
        &mut self,
        basket: &BasketId,
        caller: &ModuleId,
        callee: &ModuleId,
        f: F,
    ) -> Result<T, ModuleError>
    where
        F: FnOnce(&mut Self) -> Result<T, ModuleError>,
    {
        self.ledger.enter_hook(basket, caller, callee)?;
        let result = f(self);
        let exited = self.ledger.exit_hook(basket, callee);
        let value = result?;
        exited?;
        Ok(value)
    }

    // === Token movements on behalf of a basket ===

    /// Send `quantity` of `asset` out of the basket
    pub fn invoke_transfer(
        &mut self,
        basket: &BasketId,
        module: &ModuleId,
        asset: &AssetId,
        to: &AccountId,
        quantity: Decimal,
    ) -> Result<(), ModuleError> {
        self.ensure_module(basket, module)?;
        if quantity > Decimal::ZERO {
            self.tokens.transfer(asset, &basket.account(), to, quantity)?;
        }
        Ok(())
    }

    /// Pull `quantity` of `asset` from `from` into the basket
    pub fn pull_into_basket(
        &mut self,
        basket: &BasketId,
        module: &ModuleId,
        asset: &AssetId,
        from: &AccountId,
        quantity: Decimal,
    ) -> Result<(), ModuleError> {
        self.ensure_module(basket, module)?;
        if quantity > Decimal::ZERO {
            self.tokens.transfer(asset, from, &basket.account(), quantity)?;
        }
        Ok(())
    }

    /// Execute a trade call from the basket's account; the venue is untrusted
    pub fn invoke_exchange(
        &mut self,
        basket: &BasketId,
        module: &ModuleId,
        call: &TradeCall,
    ) -> Result<(), ModuleError> {
        self.ensure_module(basket, module)?;
        let venue = self
            .exchanges
            .get_mut(&call.target)
            .map_err(ModuleError::TradeFailed)?;
        venue
            .invoke(self.tokens, &basket.account(), call.value, &call.calldata)
            .map_err(ModuleError::TradeFailed)
    }

    /// Mint basket tokens to `to` and grow the ledger supply
    pub fn mint_basket(
        &mut self,
        basket: &BasketId,
        module: &ModuleId,
        to: &AccountId,
        quantity: Decimal,
    ) -> Result<(), ModuleError> {
        if quantity <= Decimal::ZERO {
            return Ok(());
        }
        self.ensure_module(basket, module)?;
        self.tokens.mint(&basket.asset(), to, quantity)?;
        self.ledger.increase_supply(basket, module, quantity)?;
        Ok(())
    }

    /// Burn basket tokens held by `from` and shrink the ledger supply
    pub fn burn_basket(
        &mut self,
        basket: &BasketId,
        module: &ModuleId,
        from: &AccountId,
        quantity: Decimal,
    ) -> Result<(), ModuleError> {
        if quantity <= Decimal::ZERO {
            return Ok(());
        }
        self.ensure_module(basket, module)?;
        self.tokens.burn(&basket.asset(), from, quantity)?;
        self.ledger.decrease_supply(basket, module, quantity)?;
        Ok(())
    }

    // === Position helpers ===

    /// Re-derive the default unit of `component` from its balance change since
    /// `pre_balance`, leaving airdropped amounts untracked.
    ///
    /// Returns `(current balance, previous unit, new unit)`.
    pub fn calculate_and_edit_default_position(
        &mut self,
        basket: &BasketId,
        module: &ModuleId,
        component: &AssetId,
        supply: Decimal,
        pre_balance: Decimal,
    ) -> Result<(Decimal, Decimal, Decimal), ModuleError> {
        let current = self.balance_of(basket, component);
        let previous_unit = self.basket(basket)?.default_position_real_unit(component)?;

        let new_unit = if current > Decimal::ZERO {
            calculate_default_edit_position_unit(supply, pre_balance, current, previous_unit)?
        } else {
            Decimal::ZERO
        };

        self.ledger
            .edit_default_position_unit(basket, module, component, new_unit)?;
        Ok((current, previous_unit, new_unit))
    }

    // === Events ===

    /// Buffer an event for publication after commit
    pub fn emit(&mut self, event: ProtocolEvent) {
        debug!(event = event.name(), "Event buffered");
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_integrations::MockMoneyMarket;
    use basket_ledger::{LedgerError, NewBasket};
    use rust_decimal_macros::dec;

    struct Fixture {
        controller: Controller,
        ledger: BasketLedger,
        tokens: TokenBook,
        market: MockMoneyMarket,
        exchanges: ExchangeRegistry,
        integrations: IntegrationRegistry,
        events: Vec<ProtocolEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            let owner = AccountId::from("OWNER");
            let mut controller = Controller::new(owner.clone(), AccountId::from("TREASURY"));
            controller.add_module(&owner, issuance()).unwrap();
            controller.add_module(&owner, leverage()).unwrap();
            controller.add_basket(basket()).unwrap();

            let mut ledger = BasketLedger::new();
            ledger
                .create_basket(NewBasket {
                    id: basket(),
                    manager: AccountId::from("MANAGER"),
                    components: vec![(AssetId::from("ETH"), dec!(1))],
                    modules: vec![issuance(), leverage()],
                })
                .unwrap();
            ledger.initialize_module(&basket(), &issuance()).unwrap();
            ledger.initialize_module(&basket(), &leverage()).unwrap();

            Self {
                controller,
                ledger,
                tokens: TokenBook::new(),
                market: MockMoneyMarket::new(),
                exchanges: ExchangeRegistry::new(),
                integrations: IntegrationRegistry::new(),
                events: Vec::new(),
            }
        }

        fn env(&mut self) -> Env<'_> {
            Env {
                controller: &self.controller,
                ledger: &mut self.ledger,
                tokens: &mut self.tokens,
                money_market: &mut self.market,
                exchanges: &mut self.exchanges,
                integrations: &self.integrations,
                now: Utc::now(),
                events: &mut self.events,
            }
        }
    }

    fn basket() -> BasketId {
        BasketId::from("ETH2X")
    }

    fn issuance() -> ModuleId {
        ModuleId::from("ISSUANCE")
    }

    fn leverage() -> ModuleId {
        ModuleId::from("LEVERAGE")
    }

    #[test]
    fn test_manager_and_module_checks() {
        let mut fixture = Fixture::new();
        let env = fixture.env();

        assert!(env.only_manager(&basket(), &AccountId::from("MANAGER")).is_ok());
        assert_eq!(
            env.only_manager(&basket(), &AccountId::from("STRANGER")),
            Err(ModuleError::OnlyManager)
        );
        assert!(env.only_module(&basket(), &leverage()).is_ok());
        assert_eq!(
            env.only_module(&basket(), &ModuleId::from("ROGUE")),
            Err(ModuleError::OnlyModule)
        );
    }

    #[test]
    fn test_guard_releases_after_failure() {
        let mut fixture = Fixture::new();
        let mut env = fixture.env();

        let result: Result<(), ModuleError> =
            env.guarded(&basket(), &issuance(), |_| Err(ModuleError::ZeroQuantity));
        assert_eq!(result, Err(ModuleError::ZeroQuantity));
        assert!(!env.basket(&basket()).unwrap().is_locked());
    }

    #[test]
    fn test_hook_may_write_while_locker_may_not() {
        let mut fixture = Fixture::new();
        let mut env = fixture.env();
        let usdc = AssetId::from("USDC");

        env.guarded(&basket(), &issuance(), |env| {
            // Leverage cannot write directly while issuance holds the lock
            let direct = env
                .ledger
                .edit_default_position_unit(&basket(), &leverage(), &usdc, dec!(1));
            assert!(matches!(direct, Err(LedgerError::LockedByOther { .. })));

            env.with_hook(&basket(), &issuance(), &leverage(), |env| {
                env.ledger
                    .edit_default_position_unit(&basket(), &leverage(), &usdc, dec!(1))?;
                Ok(())
            })
        })
        .unwrap();

        let state = env.basket(&basket()).unwrap();
        assert_eq!(state.default_position_real_unit(&usdc).unwrap(), dec!(1));
    }

    #[test]
    fn test_mint_and_burn_track_supply() {
        let mut fixture = Fixture::new();
        let mut env = fixture.env();
        let alice = AccountId::from("ALICE");

        env.mint_basket(&basket(), &issuance(), &alice, dec!(3)).unwrap();
        env.burn_basket(&basket(), &issuance(), &alice, dec!(1)).unwrap();

        assert_eq!(env.total_supply(&basket()).unwrap(), dec!(2));
        assert_eq!(env.tokens.balance_of(&basket().asset(), &alice), dec!(2));
    }

    #[test]
    fn test_calculate_and_edit_default_position() {
        let mut fixture = Fixture::new();
        let mut env = fixture.env();
        let usdc = AssetId::from("USDC");
        let alice = AccountId::from("ALICE");
        env.mint_basket(&basket(), &issuance(), &alice, dec!(10)).unwrap();

        // 5 USDC airdropped, then 20 USDC received by an action
        env.tokens.mint(&usdc, &basket().account(), dec!(5)).unwrap();
        let pre = env.balance_of(&basket(), &usdc);
        env.tokens.mint(&usdc, &basket().account(), dec!(20)).unwrap();

        let (current, previous, new_unit) = env
            .calculate_and_edit_default_position(&basket(), &leverage(), &usdc, dec!(10), pre)
            .unwrap();
        assert_eq!(current, dec!(25));
        assert_eq!(previous, Decimal::ZERO);
        assert_eq!(new_unit, dec!(2));
    }
}
