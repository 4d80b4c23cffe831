//! Shared fixture for issuance unit tests

use basket_bus::ProtocolEvent;
use basket_core::precise::{precise_mul, precise_mul_ceil};
use basket_core::{AccountId, AssetId, BasketId, ModuleId, TokenBook};
use basket_integrations::{ExchangeRegistry, IntegrationRegistry, MockMoneyMarket};
use basket_kernel::{
    Controller, Env, HookSet, IssuanceRegistrar, ManagerIssuanceHook, ModuleError,
    ModuleIssuanceHook,
};
use basket_ledger::{BasketLedger, NewBasket};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::module::DebtIssuanceModule;

pub fn owner() -> AccountId {
    AccountId::from("OWNER")
}

pub fn manager() -> AccountId {
    AccountId::from("MANAGER")
}

pub fn fee_recipient() -> AccountId {
    AccountId::from("MANAGER_FEES")
}

pub fn treasury() -> AccountId {
    AccountId::from("TREASURY")
}

pub fn alice() -> AccountId {
    AccountId::from("ALICE")
}

pub fn basket() -> BasketId {
    BasketId::from("IDX")
}

pub fn issuance() -> ModuleId {
    ModuleId::from("ISSUANCE")
}

pub fn lender() -> ModuleId {
    ModuleId::from("LENDER")
}

pub fn eth() -> AssetId {
    AssetId::from("ETH")
}

pub fn usdc() -> AssetId {
    AssetId::from("USDC")
}

pub fn dai() -> AssetId {
    AssetId::from("DAI")
}

/// Module with a debt position that creates and destroys the debt asset
/// out of thin air, recording every call it receives
#[derive(Debug)]
pub struct LenderHook {
    id: ModuleId,
    pub calls: Vec<String>,
}

impl LenderHook {
    fn debt_unit(&self, env: &Env<'_>, basket: &BasketId, component: &AssetId) -> Result<Decimal, ModuleError> {
        Ok(-env.basket(basket)?.external_position_real_unit(component, &self.id)?)
    }
}

impl ModuleIssuanceHook for LenderHook {
    fn module_id(&self) -> &ModuleId {
        &self.id
    }

    fn module_issue_hook(
        &mut self,
        _env: &mut Env<'_>,
        _caller: &ModuleId,
        _basket: &BasketId,
        quantity: Decimal,
    ) -> Result<(), ModuleError> {
        self.calls.push(format!("module_issue {quantity}"));
        Ok(())
    }

    fn module_redeem_hook(
        &mut self,
        _env: &mut Env<'_>,
        _caller: &ModuleId,
        _basket: &BasketId,
        quantity: Decimal,
    ) -> Result<(), ModuleError> {
        self.calls.push(format!("module_redeem {quantity}"));
        Ok(())
    }

    fn component_issue_hook(
        &mut self,
        env: &mut Env<'_>,
        _caller: &ModuleId,
        basket: &BasketId,
        quantity: Decimal,
        component: &AssetId,
        is_equity: bool,
    ) -> Result<(), ModuleError> {
        self.calls.push(format!("component_issue {component} {is_equity}"));
        if !is_equity {
            let amount = precise_mul(self.debt_unit(env, basket, component)?, quantity)?;
            env.tokens.mint(component, &basket.account(), amount)?;
        }
        Ok(())
    }

    fn component_redeem_hook(
        &mut self,
        env: &mut Env<'_>,
        _caller: &ModuleId,
        basket: &BasketId,
        quantity: Decimal,
        component: &AssetId,
        is_equity: bool,
    ) -> Result<(), ModuleError> {
        self.calls.push(format!("component_redeem {component} {is_equity}"));
        if !is_equity {
            let amount = precise_mul_ceil(self.debt_unit(env, basket, component)?, quantity)?;
            env.tokens.burn(component, &basket.account(), amount)?;
        }
        Ok(())
    }
}

/// IDX basket: 0.5 ETH and 100 USDC of equity, 10 DAI of debt owned by LENDER
pub struct Fixture {
    pub controller: Controller,
    pub ledger: BasketLedger,
    pub tokens: TokenBook,
    pub market: MockMoneyMarket,
    pub exchanges: ExchangeRegistry,
    pub integrations: IntegrationRegistry,
    pub events: Vec<ProtocolEvent>,
    pub module: DebtIssuanceModule,
    pub lender: LenderHook,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_manager_hook(None)
    }

    pub fn with_manager_hook(hook: Option<Arc<dyn ManagerIssuanceHook>>) -> Self {
        let mut controller = Controller::new(owner(), treasury());
        controller.add_module(&owner(), issuance()).unwrap();
        controller.add_module(&owner(), lender()).unwrap();
        controller.add_basket(basket()).unwrap();

        let mut ledger = BasketLedger::new();
        ledger
            .create_basket(NewBasket {
                id: basket(),
                manager: manager(),
                components: vec![(eth(), dec!(0.5)), (usdc(), dec!(100))],
                modules: vec![issuance(), lender()],
            })
            .unwrap();
        ledger.initialize_module(&basket(), &lender()).unwrap();
        ledger
            .edit_external_position_unit(&basket(), &lender(), &dai(), &lender(), dec!(-10), Vec::new())
            .unwrap();

        let mut tokens = TokenBook::new();
        tokens.mint(&eth(), &alice(), dec!(100)).unwrap();
        tokens.mint(&usdc(), &alice(), dec!(100000)).unwrap();

        let mut fixture = Self {
            controller,
            ledger,
            tokens,
            market: MockMoneyMarket::new(),
            exchanges: ExchangeRegistry::new(),
            integrations: IntegrationRegistry::new(),
            events: Vec::new(),
            module: DebtIssuanceModule::new(issuance()),
            lender: LenderHook {
                id: lender(),
                calls: Vec::new(),
            },
        };
        fixture
            .run(|module, env, _| {
                module.initialize(
                    env,
                    &manager(),
                    &basket(),
                    dec!(0.1),
                    Decimal::ZERO,
                    Decimal::ZERO,
                    fee_recipient(),
                    hook,
                )?;
                module.register(env, &lender(), &basket())
            })
            .unwrap();
        fixture
    }

    /// Run `f` with a fresh `Env` and the lender hook available
    pub fn run<T>(
        &mut self,
        f: impl FnOnce(&mut DebtIssuanceModule, &mut Env<'_>, &mut HookSet<'_>) -> T,
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
        let mut hooks = HookSet::new().with(&mut self.lender);
        f(&mut self.module, &mut env, &mut hooks)
    }

    pub fn balance(&self, asset: &AssetId, holder: &AccountId) -> Decimal {
        self.tokens.balance_of(asset, holder)
    }

    pub fn supply(&self) -> Decimal {
        self.ledger.basket(&basket()).unwrap().total_supply()
    }
}
