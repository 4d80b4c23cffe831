//! Application context - wires every engine behind one transactional facade
//!
//! Each public operation runs against a snapshot of `ProtocolState`. If the
//! operation fails the snapshot is restored, so callers never observe a
//! half-applied lever or issue. Events buffered by the engines reach the
//! bus only after commit.

use basket_bus::{EventBus, ProtocolEvent};
use basket_core::{AccountId, AssetId, BasketId, ModuleId, TokenBook};
use basket_fees::{StreamingFeeModule, PROTOCOL_STREAMING_FEE_INDEX};
use basket_integrations::{
    Exchange, ExchangeRegistry, IntegrationError, IntegrationRegistry, MockMoneyMarket,
    MoneyMarket, TradeAdapter,
};
use basket_issuance::{
    ComponentFlow, DebtIssuanceModule, FeeBreakdown, PROTOCOL_FEE_SPLIT_INDEX,
};
use basket_kernel::{
    ConfigError, Controller, Env, HookSet, ManagerIssuanceHook, ModuleError, ProtocolConfig,
};
use basket_ledger::{BasketLedger, BasketState, NewBasket, Position};
use basket_leverage::{
    DeleverParams, DeleverToZeroParams, LeverParams, LeverageModule, PROTOCOL_TRADE_FEE_INDEX,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

pub const LEVERAGE_MODULE: &str = "LEVERAGE";
pub const ISSUANCE_MODULE: &str = "DEBT_ISSUANCE";
pub const STREAMING_FEE_MODULE: &str = "STREAMING_FEE";

/// Errors raised outside a module transaction
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),
}

/// Shared collaborators every module operates on
#[derive(Debug, Clone)]
pub struct CoreState<M> {
    pub controller: Controller,
    pub ledger: BasketLedger,
    pub tokens: TokenBook,
    pub money_market: M,
    pub exchanges: ExchangeRegistry,
    pub integrations: IntegrationRegistry,
    pub now: DateTime<Utc>,
}

impl<M: MoneyMarket + 'static> CoreState<M> {
    /// Borrow everything a module needs for one operation
    pub fn env<'a>(&'a mut self, events: &'a mut Vec<ProtocolEvent>) -> Env<'a> {
        Env {
            controller: &self.controller,
            ledger: &mut self.ledger,
            tokens: &mut self.tokens,
            money_market: &mut self.money_market,
            exchanges: &mut self.exchanges,
            integrations: &self.integrations,
            now: self.now,
            events,
        }
    }
}

/// Everything a transaction may change
#[derive(Debug, Clone)]
pub struct ProtocolState<M> {
    pub core: CoreState<M>,
    pub leverage: LeverageModule,
    pub issuance: DebtIssuanceModule,
    pub streaming_fee: StreamingFeeModule,
}

/// Application context - owns protocol state, the clock and the event bus
pub struct AppContext<M> {
    state: ProtocolState<M>,
    pub bus: EventBus,
    config: ProtocolConfig,
}

/// Context wired to the in-memory money market
pub type MockContext = AppContext<MockMoneyMarket>;

impl<M: MoneyMarket + Clone + 'static> AppContext<M> {
    /// Build a context: enable the three modules on the controller and
    /// register their protocol fees from `config`
    pub fn new(config: ProtocolConfig, money_market: M) -> Result<Self, ContextError> {
        config.validate()?;
        let owner = config.owner.clone();
        let leverage_id = ModuleId::from(LEVERAGE_MODULE);
        let issuance_id = ModuleId::from(ISSUANCE_MODULE);
        let fee_id = ModuleId::from(STREAMING_FEE_MODULE);

        let mut controller = Controller::from_config(&config);
        for module in [&leverage_id, &issuance_id, &fee_id] {
            controller.add_module(&owner, module.clone())?;
        }
        controller.add_fee(
            &owner,
            &leverage_id,
            PROTOCOL_TRADE_FEE_INDEX,
            config.leverage_protocol_fee,
        )?;
        controller.add_fee(
            &owner,
            &issuance_id,
            PROTOCOL_FEE_SPLIT_INDEX,
            config.issuance_protocol_fee_split,
        )?;
        controller.add_fee(
            &owner,
            &fee_id,
            PROTOCOL_STREAMING_FEE_INDEX,
            config.streaming_protocol_fee_split,
        )?;

        let state = ProtocolState {
            core: CoreState {
                controller,
                ledger: BasketLedger::new(),
                tokens: TokenBook::new(),
                money_market,
                exchanges: ExchangeRegistry::new(),
                integrations: IntegrationRegistry::new(),
                now: config.genesis,
            },
            leverage: LeverageModule::new(leverage_id, issuance_id.clone()),
            issuance: DebtIssuanceModule::new(issuance_id),
            streaming_fee: StreamingFeeModule::new(fee_id),
        };

        info!(owner = %owner, genesis = %config.genesis, "Protocol context ready");
        Ok(Self {
            state,
            bus: EventBus::new(config.event_capacity),
            config,
        })
    }

    // === Accessors ===

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn state(&self) -> &ProtocolState<M> {
        &self.state
    }

    /// Direct access for seeding balances and simulating market events
    pub fn state_mut(&mut self) -> &mut ProtocolState<M> {
        &mut self.state
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.state.core.now
    }

    pub fn advance_time(&mut self, by: Duration) {
        self.state.core.now += by;
        debug!(now = %self.state.core.now, "Clock advanced");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.bus.subscribe()
    }

    pub fn leverage_id(&self) -> &ModuleId {
        self.state.leverage.id()
    }

    pub fn issuance_id(&self) -> &ModuleId {
        self.state.issuance.id()
    }

    pub fn streaming_fee_id(&self) -> &ModuleId {
        self.state.streaming_fee.id()
    }

    // === Transactions ===

    /// Run `f` atomically.
    ///
    /// Flow: Snapshot → Execute → Commit (publish events) | Restore
    fn transact<T, F>(&mut self, op: &'static str, f: F) -> Result<T, ModuleError>
    where
        F: FnOnce(&mut ProtocolState<M>, &mut Vec<ProtocolEvent>) -> Result<T, ModuleError>,
    {
        let tx_id = Uuid::new_v4();
        let span = info_span!("transaction", tx_id = %tx_id, op);
        let _guard = span.enter();

        let snapshot = self.state.clone();
        let mut events = Vec::new();

        match f(&mut self.state, &mut events) {
            Ok(value) => {
                debug!(events = events.len(), "Committed");
                self.bus.publish_all(events);
                Ok(value)
            }
            Err(e) => {
                self.state = snapshot;
                warn!(kind = %e.kind(), error = %e, "Reverted");
                Err(e)
            }
        }
    }

    // === Controller ===

    pub fn enable_module(&mut self, caller: &AccountId, module: ModuleId) -> Result<(), ModuleError> {
        self.transact("enable_module", |state, _| {
            state.core.controller.add_module(caller, module)
        })
    }

    pub fn disable_module(&mut self, caller: &AccountId, module: &ModuleId) -> Result<(), ModuleError> {
        self.transact("disable_module", |state, _| {
            state.core.controller.remove_module(caller, module)
        })
    }

    pub fn add_fee(
        &mut self,
        caller: &AccountId,
        module: &ModuleId,
        index: usize,
        fee: Decimal,
    ) -> Result<(), ModuleError> {
        self.transact("add_fee", |state, _| {
            state.core.controller.add_fee(caller, module, index, fee)
        })
    }

    pub fn edit_fee(
        &mut self,
        caller: &AccountId,
        module: &ModuleId,
        index: usize,
        fee: Decimal,
    ) -> Result<(), ModuleError> {
        self.transact("edit_fee", |state, _| {
            state.core.controller.edit_fee(caller, module, index, fee)
        })
    }

    pub fn edit_fee_recipient(
        &mut self,
        caller: &AccountId,
        recipient: AccountId,
    ) -> Result<(), ModuleError> {
        self.transact("edit_fee_recipient", |state, _| {
            state.core.controller.edit_fee_recipient(caller, recipient)
        })
    }

    /// Register a trading venue under its own address (owner only)
    pub fn add_exchange(
        &mut self,
        caller: &AccountId,
        exchange: Box<dyn Exchange>,
    ) -> Result<(), ModuleError> {
        self.transact("add_exchange", |state, _| {
            state.core.controller.only_owner(caller)?;
            state.core.exchanges.register(exchange);
            Ok(())
        })
    }

    /// Make `adapter` resolvable by name for `module` (owner only)
    pub fn add_integration(
        &mut self,
        caller: &AccountId,
        module: &ModuleId,
        adapter: Arc<dyn TradeAdapter>,
    ) -> Result<(), ContextError> {
        self.state.core.controller.only_owner(caller)?;
        self.state.core.integrations.add_integration(module, adapter)?;
        Ok(())
    }

    // === Basket factory and module lifecycle ===

    /// Create a basket with controller-enabled modules in pending state
    pub fn create_basket(&mut self, params: NewBasket) -> Result<(), ModuleError> {
        self.transact("create_basket", |state, events| {
            if params
                .modules
                .iter()
                .any(|module| !state.core.controller.is_module(module))
            {
                return Err(ModuleError::ModuleNotEnabled);
            }
            let components = params.components.iter().map(|(c, _)| c.clone()).collect();
            let basket = params.id.clone();
            let manager = params.manager.clone();

            state.core.ledger.create_basket(params)?;
            state.core.controller.add_basket(basket.clone())?;

            info!(basket = %basket, manager = %manager, "Basket created");
            events.push(ProtocolEvent::BasketCreated {
                basket,
                manager,
                components,
            });
            Ok(())
        })
    }

    /// Add a controller-enabled module in pending state (manager only)
    pub fn add_module(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        module: &ModuleId,
    ) -> Result<(), ModuleError> {
        self.transact("add_module", |state, events| {
            let mut env = state.core.env(events);
            env.only_manager(basket, caller)?;
            if !env.controller.is_module(module) {
                return Err(ModuleError::ModuleNotEnabled);
            }
            env.ledger.add_module(basket, module)?;
            env.emit(ProtocolEvent::ModuleAdded {
                basket: basket.clone(),
                module: module.clone(),
            });
            Ok(())
        })
    }

    /// Remove a module from a basket (manager only).
    ///
    /// Initialized modules run their own teardown first; a pending module is
    /// simply dropped.
    pub fn remove_module(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        module: &ModuleId,
    ) -> Result<(), ModuleError> {
        self.transact("remove_module", |state, events| {
            let mut env = state.core.env(events);
            env.only_manager(basket, caller)?;

            if env.basket(basket)?.is_pending_module(module) {
                env.ledger.remove_pending_module(basket, module)?;
            } else {
                if module == state.leverage.id() {
                    state
                        .leverage
                        .remove_module(&mut env, &mut state.issuance, basket)?;
                } else if module == state.issuance.id() {
                    state.issuance.remove_module(&mut env, basket)?;
                } else if module == state.streaming_fee.id() {
                    state.streaming_fee.remove_module(&mut env, basket)?;
                }
                env.ledger.remove_module(basket, module)?;
            }

            env.emit(ProtocolEvent::ModuleRemoved {
                basket: basket.clone(),
                module: module.clone(),
            });
            Ok(())
        })
    }

    // === Leverage: owner ===

    pub fn add_money_market(
        &mut self,
        caller: &AccountId,
        market: &AssetId,
        underlying: &AssetId,
    ) -> Result<(), ModuleError> {
        self.transact("add_money_market", |state, events| {
            let mut env = state.core.env(events);
            state
                .leverage
                .add_money_market(&mut env, caller, market, underlying)
        })
    }

    pub fn remove_money_market(
        &mut self,
        caller: &AccountId,
        underlying: &AssetId,
    ) -> Result<(), ModuleError> {
        self.transact("remove_money_market", |state, events| {
            let mut env = state.core.env(events);
            state.leverage.remove_money_market(&mut env, caller, underlying)
        })
    }

    pub fn update_allowed_basket(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        allowed: bool,
    ) -> Result<(), ModuleError> {
        self.transact("update_allowed_basket", |state, events| {
            let mut env = state.core.env(events);
            state
                .leverage
                .update_allowed_basket(&mut env, caller, basket, allowed)
        })
    }

    pub fn update_any_basket_allowed(
        &mut self,
        caller: &AccountId,
        any_basket_allowed: bool,
    ) -> Result<(), ModuleError> {
        self.transact("update_any_basket_allowed", |state, events| {
            let mut env = state.core.env(events);
            state
                .leverage
                .update_any_basket_allowed(&mut env, caller, any_basket_allowed)
        })
    }

    // === Leverage: manager ===

    pub fn initialize_leverage(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        collateral_assets: &[AssetId],
        borrow_assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        self.transact("initialize_leverage", |state, events| {
            let mut env = state.core.env(events);
            state.leverage.initialize(
                &mut env,
                &mut state.issuance,
                caller,
                basket,
                collateral_assets,
                borrow_assets,
            )
        })
    }

    pub fn register_to_issuance_module(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
    ) -> Result<(), ModuleError> {
        self.transact("register_to_issuance_module", |state, events| {
            let mut env = state.core.env(events);
            state
                .leverage
                .register_to_issuance_module(&mut env, &mut state.issuance, caller, basket)
        })
    }

    pub fn add_collateral_assets(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        self.transact("add_collateral_assets", |state, events| {
            let mut env = state.core.env(events);
            state
                .leverage
                .add_collateral_assets(&mut env, caller, basket, assets)
        })
    }

    pub fn add_borrow_assets(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        self.transact("add_borrow_assets", |state, events| {
            let mut env = state.core.env(events);
            state.leverage.add_borrow_assets(&mut env, caller, basket, assets)
        })
    }

    pub fn remove_collateral_assets(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        self.transact("remove_collateral_assets", |state, events| {
            let mut env = state.core.env(events);
            state
                .leverage
                .remove_collateral_assets(&mut env, caller, basket, assets)
        })
    }

    pub fn remove_borrow_assets(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        self.transact("remove_borrow_assets", |state, events| {
            let mut env = state.core.env(events);
            state
                .leverage
                .remove_borrow_assets(&mut env, caller, basket, assets)
        })
    }

    pub fn lever(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        params: &LeverParams,
    ) -> Result<Decimal, ModuleError> {
        self.transact("lever", |state, events| {
            let mut env = state.core.env(events);
            state.leverage.lever(&mut env, caller, basket, params)
        })
    }

    pub fn delever(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        params: &DeleverParams,
    ) -> Result<Decimal, ModuleError> {
        self.transact("delever", |state, events| {
            let mut env = state.core.env(events);
            state.leverage.delever(&mut env, caller, basket, params)
        })
    }

    pub fn delever_to_zero_borrow_balance(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        params: &DeleverToZeroParams,
    ) -> Result<Decimal, ModuleError> {
        self.transact("delever_to_zero_borrow_balance", |state, events| {
            let mut env = state.core.env(events);
            state
                .leverage
                .delever_to_zero_borrow_balance(&mut env, caller, basket, params)
        })
    }

    /// Anyone may sync
    pub fn sync(&mut self, basket: &BasketId, accrue_interest: bool) -> Result<(), ModuleError> {
        self.transact("sync", |state, events| {
            let mut env = state.core.env(events);
            state.leverage.sync(&mut env, basket, accrue_interest)
        })
    }

    // === Issuance ===

    #[allow(clippy::too_many_arguments)]
    pub fn initialize_issuance(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        max_manager_fee: Decimal,
        manager_issue_fee: Decimal,
        manager_redeem_fee: Decimal,
        fee_recipient: AccountId,
        manager_issuance_hook: Option<Arc<dyn ManagerIssuanceHook>>,
    ) -> Result<(), ModuleError> {
        self.transact("initialize_issuance", |state, events| {
            let mut env = state.core.env(events);
            state.issuance.initialize(
                &mut env,
                caller,
                basket,
                max_manager_fee,
                manager_issue_fee,
                manager_redeem_fee,
                fee_recipient,
                manager_issuance_hook,
            )
        })
    }

    pub fn issue(
        &mut self,
        issuer: &AccountId,
        basket: &BasketId,
        quantity: Decimal,
        to: &AccountId,
    ) -> Result<(), ModuleError> {
        self.transact("issue", |state, events| {
            let mut env = state.core.env(events);
            let mut hooks = HookSet::new().with(&mut state.leverage);
            state
                .issuance
                .issue(&mut env, &mut hooks, issuer, basket, quantity, to)
        })
    }

    pub fn redeem(
        &mut self,
        redeemer: &AccountId,
        basket: &BasketId,
        quantity: Decimal,
        to: &AccountId,
    ) -> Result<(), ModuleError> {
        self.transact("redeem", |state, events| {
            let mut env = state.core.env(events);
            let mut hooks = HookSet::new().with(&mut state.leverage);
            state
                .issuance
                .redeem(&mut env, &mut hooks, redeemer, basket, quantity, to)
        })
    }

    pub fn update_issue_fee(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        new_fee: Decimal,
    ) -> Result<(), ModuleError> {
        self.transact("update_issue_fee", |state, events| {
            let mut env = state.core.env(events);
            state.issuance.update_issue_fee(&mut env, caller, basket, new_fee)
        })
    }

    pub fn update_redeem_fee(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        new_fee: Decimal,
    ) -> Result<(), ModuleError> {
        self.transact("update_redeem_fee", |state, events| {
            let mut env = state.core.env(events);
            state.issuance.update_redeem_fee(&mut env, caller, basket, new_fee)
        })
    }

    pub fn update_issuance_fee_recipient(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        new_recipient: AccountId,
    ) -> Result<(), ModuleError> {
        self.transact("update_issuance_fee_recipient", |state, events| {
            let mut env = state.core.env(events);
            state
                .issuance
                .update_fee_recipient(&mut env, caller, basket, new_recipient)
        })
    }

    // === Streaming fee ===

    pub fn initialize_streaming_fee(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        fee_recipient: AccountId,
        max_streaming_fee_percentage: Decimal,
        streaming_fee_percentage: Decimal,
    ) -> Result<(), ModuleError> {
        self.transact("initialize_streaming_fee", |state, events| {
            let mut env = state.core.env(events);
            state.streaming_fee.initialize(
                &mut env,
                caller,
                basket,
                fee_recipient,
                max_streaming_fee_percentage,
                streaming_fee_percentage,
            )
        })
    }

    /// Anyone may accrue; returns `(manager fee, protocol fee)`
    pub fn accrue_fee(&mut self, basket: &BasketId) -> Result<(Decimal, Decimal), ModuleError> {
        self.transact("accrue_fee", |state, events| {
            let mut env = state.core.env(events);
            state.streaming_fee.accrue_fee(&mut env, basket)
        })
    }

    pub fn update_streaming_fee(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        new_fee: Decimal,
    ) -> Result<(), ModuleError> {
        self.transact("update_streaming_fee", |state, events| {
            let mut env = state.core.env(events);
            state
                .streaming_fee
                .update_streaming_fee(&mut env, caller, basket, new_fee)
        })
    }

    pub fn update_streaming_fee_recipient(
        &mut self,
        caller: &AccountId,
        basket: &BasketId,
        new_recipient: AccountId,
    ) -> Result<(), ModuleError> {
        self.transact("update_streaming_fee_recipient", |state, events| {
            let mut env = state.core.env(events);
            state
                .streaming_fee
                .update_fee_recipient(&mut env, caller, basket, new_recipient)
        })
    }

    // === Views ===

    pub fn basket(&self, basket: &BasketId) -> Result<&BasketState, ModuleError> {
        Ok(self.state.core.ledger.basket(basket)?)
    }

    pub fn positions(&self, basket: &BasketId) -> Result<Vec<Position>, ModuleError> {
        Ok(self.basket(basket)?.positions()?)
    }

    pub fn balance_of(&self, asset: &AssetId, holder: &AccountId) -> Decimal {
        self.state.core.tokens.balance_of(asset, holder)
    }

    /// Stored debt of the basket in `market`
    pub fn borrow_balance(&self, basket: &BasketId, market: &AssetId) -> Decimal {
        self.state
            .core
            .money_market
            .borrow_balance_stored(&basket.account(), market)
    }

    /// Streaming fee fraction accrued since the last actualization
    pub fn get_fee(&mut self, basket: &BasketId) -> Result<Decimal, ModuleError> {
        let mut events = Vec::new();
        let state = &mut self.state;
        let env = state.core.env(&mut events);
        state.streaming_fee.get_fee(&env, basket)
    }

    pub fn calculate_total_fees(
        &mut self,
        basket: &BasketId,
        quantity: Decimal,
        is_issue: bool,
    ) -> Result<FeeBreakdown, ModuleError> {
        let mut events = Vec::new();
        let state = &mut self.state;
        let env = state.core.env(&mut events);
        state
            .issuance
            .calculate_total_fees(&env, basket, quantity, is_issue)
    }

    /// Equity to deliver and debt to receive when issuing `quantity`
    pub fn required_issuance_units(
        &mut self,
        basket: &BasketId,
        quantity: Decimal,
    ) -> Result<Vec<ComponentFlow>, ModuleError> {
        let mut events = Vec::new();
        let state = &mut self.state;
        let env = state.core.env(&mut events);
        state
            .issuance
            .get_required_component_issuance_units(&env, basket, quantity, true)
    }

    /// Equity received and debt to return when redeeming `quantity`
    pub fn required_redemption_units(
        &mut self,
        basket: &BasketId,
        quantity: Decimal,
    ) -> Result<Vec<ComponentFlow>, ModuleError> {
        let mut events = Vec::new();
        let state = &mut self.state;
        let env = state.core.env(&mut events);
        state
            .issuance
            .get_required_component_redemption_units(&env, basket, quantity)
    }
}
