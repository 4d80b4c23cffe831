//! Issuance hooks: keep debt in step with basket supply

use basket_core::precise::{precise_mul, precise_mul_ceil};
use basket_core::{AssetId, BasketId, ModuleId};
use basket_kernel::{Env, ModuleError, ModuleIssuanceHook};
use rust_decimal::Decimal;
use tracing::debug;

use crate::module::LeverageModule;

impl LeverageModule {
    /// Debt per basket token in `component` (positive) and its market
    fn hook_debt(
        &self,
        env: &Env<'_>,
        basket: &BasketId,
        component: &AssetId,
    ) -> Result<(Decimal, AssetId), ModuleError> {
        let unit = env
            .basket(basket)?
            .external_position_real_unit(component, &self.id)?;
        if unit >= Decimal::ZERO {
            return Err(ModuleError::ComponentNotNegative);
        }
        let market = self
            .market_for(component)
            .cloned()
            .ok_or(ModuleError::MarketNotAdded)?;
        Ok((-unit, market))
    }
}

impl ModuleIssuanceHook for LeverageModule {
    fn module_id(&self) -> &ModuleId {
        &self.id
    }

    fn module_issue_hook(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
        _quantity: Decimal,
    ) -> Result<(), ModuleError> {
        env.only_module(basket, caller)?;
        self.sync_positions(env, basket, false)
    }

    fn module_redeem_hook(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
        _quantity: Decimal,
    ) -> Result<(), ModuleError> {
        env.only_module(basket, caller)?;
        self.sync_positions(env, basket, false)
    }

    /// Borrow the issue's share of debt into the basket
    fn component_issue_hook(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
        quantity: Decimal,
        component: &AssetId,
        is_equity: bool,
    ) -> Result<(), ModuleError> {
        env.only_module(basket, caller)?;
        if is_equity {
            return Ok(());
        }
        let (unit, market) = self.hook_debt(env, basket, component)?;
        let notional = precise_mul(unit, quantity)?;
        self.borrow(env, basket, &market, notional)?;
        debug!(basket = %basket, component = %component, borrowed = %notional, "Issue hook borrowed");
        Ok(())
    }

    /// Repay the redemption's share of debt from the basket
    fn component_redeem_hook(
        &mut self,
        env: &mut Env<'_>,
        caller: &ModuleId,
        basket: &BasketId,
        quantity: Decimal,
        component: &AssetId,
        is_equity: bool,
    ) -> Result<(), ModuleError> {
        env.only_module(basket, caller)?;
        if is_equity {
            return Ok(());
        }
        let (unit, market) = self.hook_debt(env, basket, component)?;
        let notional = precise_mul_ceil(unit, quantity)?;
        self.repay_borrow(env, basket, &market, notional)?;
        debug!(basket = %basket, component = %component, repaid = %notional, "Redeem hook repaid");
        Ok(())
    }
}
