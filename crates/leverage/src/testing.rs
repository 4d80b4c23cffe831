//! Shared fixture for leverage unit tests

use basket_bus::ProtocolEvent;
use basket_core::{AccountId, AssetId, BasketId, ModuleId, TokenBook};
use basket_integrations::{
    ExchangeRegistry, IntegrationRegistry, MarketConfig, MockExchange, MockMoneyMarket,
    MockTradeAdapter,
};
use basket_kernel::{Controller, Env, IssuanceRegistrar, ModuleError};
use basket_ledger::{BasketLedger, NewBasket};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::module::LeverageModule;

pub fn owner() -> AccountId {
    AccountId::from("OWNER")
}

pub fn manager() -> AccountId {
    AccountId::from("MANAGER")
}

pub fn treasury() -> AccountId {
    AccountId::from("TREASURY")
}

pub fn basket() -> BasketId {
    BasketId::from("ETH2X")
}

pub fn issuance() -> ModuleId {
    ModuleId::from("ISSUANCE")
}

pub fn leverage() -> ModuleId {
    ModuleId::from("LEVERAGE")
}

pub fn eth() -> AssetId {
    AssetId::from("ETH")
}

pub fn usdc() -> AssetId {
    AssetId::from("USDC")
}

pub fn ceth() -> AssetId {
    AssetId::from("CETH")
}

pub fn cusdc() -> AssetId {
    AssetId::from("CUSDC")
}

pub fn venue() -> AccountId {
    AccountId::from("VENUE")
}

pub const ADAPTER: &str = "MOCK_DEX";

/// Stands in for the issuance module's registration list
#[derive(Debug)]
pub struct RecordingRegistrar {
    id: ModuleId,
    pub registered: Vec<(BasketId, ModuleId)>,
}

impl RecordingRegistrar {
    pub fn new() -> Self {
        Self {
            id: issuance(),
            registered: Vec::new(),
        }
    }
}

impl IssuanceRegistrar for RecordingRegistrar {
    fn issuance_module_id(&self) -> &ModuleId {
        &self.id
    }

    fn register(
        &mut self,
        _env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
    ) -> Result<(), ModuleError> {
        let entry = (basket.clone(), caller.clone());
        if self.registered.contains(&entry) {
            return Err(ModuleError::ModuleAlreadyRegistered);
        }
        self.registered.push(entry);
        Ok(())
    }

    fn unregister(
        &mut self,
        _env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
    ) -> Result<(), ModuleError> {
        let before = self.registered.len();
        self.registered.retain(|(b, m)| !(b == basket && m == caller));
        if self.registered.len() == before {
            return Err(ModuleError::ModuleNotRegistered);
        }
        Ok(())
    }
}

/// Ten ETH2X tokens backed by one CETH each, leverage initialized with
/// ETH as collateral and USDC as borrow asset. ETH trades at 1000 USDC.
pub struct Fixture {
    pub controller: Controller,
    pub ledger: BasketLedger,
    pub tokens: TokenBook,
    pub market: MockMoneyMarket,
    pub exchanges: ExchangeRegistry,
    pub integrations: IntegrationRegistry,
    pub events: Vec<ProtocolEvent>,
    pub module: LeverageModule,
    pub registrar: RecordingRegistrar,
}

impl Fixture {
    pub fn new() -> Self {
        let mut controller = Controller::new(owner(), treasury());
        controller.add_module(&owner(), issuance()).unwrap();
        controller.add_module(&owner(), leverage()).unwrap();
        controller.add_basket(basket()).unwrap();

        let mut ledger = BasketLedger::new();
        ledger
            .create_basket(NewBasket {
                id: basket(),
                manager: manager(),
                components: vec![(ceth(), dec!(1))],
                modules: vec![issuance(), leverage()],
            })
            .unwrap();
        ledger.initialize_module(&basket(), &issuance()).unwrap();
        ledger.increase_supply(&basket(), &issuance(), dec!(10)).unwrap();

        let mut market = MockMoneyMarket::new();
        market.list_market(
            ceth(),
            MarketConfig {
                underlying: eth(),
                exchange_rate: dec!(1),
                collateral_factor: dec!(0.75),
                price: dec!(1000),
            },
        );
        market.list_market(
            cusdc(),
            MarketConfig {
                underlying: usdc(),
                exchange_rate: dec!(1),
                collateral_factor: dec!(0.8),
                price: dec!(1),
            },
        );

        let mut tokens = TokenBook::new();
        tokens.mint(&basket().asset(), &AccountId::from("HOLDER"), dec!(10)).unwrap();
        tokens.mint(&ceth(), &basket().account(), dec!(10)).unwrap();
        tokens.mint(&eth(), &ceth().reserve_account(), dec!(1000)).unwrap();
        tokens.mint(&usdc(), &cusdc().reserve_account(), dec!(1000000)).unwrap();
        tokens.mint(&eth(), &venue(), dec!(1000)).unwrap();
        tokens.mint(&usdc(), &venue(), dec!(1000000)).unwrap();

        let mut exchange = MockExchange::new(venue());
        exchange.set_rate(usdc(), eth(), dec!(0.001));
        exchange.set_rate(eth(), usdc(), dec!(1000));
        let mut exchanges = ExchangeRegistry::new();
        exchanges.register(Box::new(exchange));

        let mut integrations = IntegrationRegistry::new();
        integrations
            .add_integration(&leverage(), Arc::new(MockTradeAdapter::new(ADAPTER, venue())))
            .unwrap();

        let mut fixture = Self {
            controller,
            ledger,
            tokens,
            market,
            exchanges,
            integrations,
            events: Vec::new(),
            module: LeverageModule::new(leverage(), issuance()),
            registrar: RecordingRegistrar::new(),
        };

        fixture
            .run(|module, env, _| {
                module.add_money_market(env, &owner(), &ceth(), &eth())?;
                module.add_money_market(env, &owner(), &cusdc(), &usdc())?;
                module.update_allowed_basket(env, &owner(), &basket(), true)
            })
            .unwrap();
        fixture
            .run(|module, env, registrar| {
                module.initialize(env, registrar, &manager(), &basket(), &[eth()], &[usdc()])
            })
            .unwrap();
        fixture
    }

    /// Run `f` against the module with a fresh `Env`
    pub fn run<T>(
        &mut self,
        f: impl FnOnce(&mut LeverageModule, &mut Env<'_>, &mut RecordingRegistrar) -> T,
    ) -> T {
        let mut env = Env {
            controller: &self.controller,
            ledger: &mut self.ledger,
            tokens: &mut self.tokens,
            money_market: &mut self.market,
            exchanges: &mut self.exchanges,
            integrations: &self.integrations,
            now: Utc::now(),
            events: &mut self.events,
        };
        f(&mut self.module, &mut env, &mut self.registrar)
    }

    pub fn default_unit(&self, component: &AssetId) -> Decimal {
        self.ledger
            .basket(&basket())
            .unwrap()
            .default_position_real_unit(component)
            .unwrap()
    }

    pub fn debt_unit(&self, component: &AssetId) -> Decimal {
        self.ledger
            .basket(&basket())
            .unwrap()
            .external_position_real_unit(component, &leverage())
            .unwrap()
    }

    pub fn basket_balance(&self, asset: &AssetId) -> Decimal {
        self.tokens.balance_of(asset, &basket().account())
    }
}
