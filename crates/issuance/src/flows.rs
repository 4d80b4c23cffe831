//! Issue and redeem flows

use basket_bus::ProtocolEvent;
use basket_core::precise::{precise_mul, precise_mul_ceil};
use basket_core::{AccountId, AssetId, BasketId};
use basket_kernel::{Env, HookSet, ModuleError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::module::DebtIssuanceModule;
use crate::PROTOCOL_FEE_SPLIT_INDEX;

/// Notional equity and debt that move for one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFlow {
    pub component: AssetId,
    pub equity: Decimal,
    pub debt: Decimal,
}

/// Quantity after fees and how the fee is split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Quantity plus fees on issue, minus fees on redeem
    pub total_quantity: Decimal,
    pub manager_fee: Decimal,
    pub protocol_fee: Decimal,
}

impl DebtIssuanceModule {
    // === Views ===

    /// Fee owed on an issue or redeem of `quantity`
    pub fn calculate_total_fees(
        &self,
        env: &Env<'_>,
        basket: &BasketId,
        quantity: Decimal,
        is_issue: bool,
    ) -> Result<FeeBreakdown, ModuleError> {
        let settings = self.settings_of(basket)?;
        let fee_rate = if is_issue {
            settings.manager_issue_fee
        } else {
            settings.manager_redeem_fee
        };
        let split = env.controller.module_fee(&self.id, PROTOCOL_FEE_SPLIT_INDEX);

        // Fee rounds up, the protocol share of it rounds down
        let total_fee = precise_mul_ceil(fee_rate, quantity)?;
        let protocol_fee = precise_mul(total_fee, split)?;
        let manager_fee = total_fee - protocol_fee;
        let total_quantity = if is_issue {
            quantity + total_fee
        } else {
            quantity - total_fee
        };

        Ok(FeeBreakdown {
            total_quantity,
            manager_fee,
            protocol_fee,
        })
    }

    /// Component flows for issuing (or redeeming) `quantity`, fees included
    pub fn get_required_component_issuance_units(
        &self,
        env: &Env<'_>,
        basket: &BasketId,
        quantity: Decimal,
        is_issue: bool,
    ) -> Result<Vec<ComponentFlow>, ModuleError> {
        let fees = self.calculate_total_fees(env, basket, quantity, is_issue)?;
        required_component_flows(env, basket, fees.total_quantity, is_issue)
    }

    /// Component flows for redeeming `quantity`, fees included
    pub fn get_required_component_redemption_units(
        &self,
        env: &Env<'_>,
        basket: &BasketId,
        quantity: Decimal,
    ) -> Result<Vec<ComponentFlow>, ModuleError> {
        self.get_required_component_issuance_units(env, basket, quantity, false)
    }

    // === Issue / redeem ===

    /// Mint `quantity` to `to`, collecting equity from `issuer` and handing
    /// them the debt that comes with it.
    pub fn issue(
        &self,
        env: &mut Env<'_>,
        hooks: &mut HookSet<'_>,
        issuer: &AccountId,
        basket: &BasketId,
        quantity: Decimal,
        to: &AccountId,
    ) -> Result<(), ModuleError> {
        env.only_valid_and_initialized(basket, &self.id)?;
        if quantity <= Decimal::ZERO {
            return Err(ModuleError::IssueQuantityZero);
        }
        let settings = self.settings_of(basket)?.clone();

        env.guarded(basket, &self.id, |env| {
            if let Some(hook) = &settings.manager_issuance_hook {
                hook.invoke_pre_issue_hook(env, basket, quantity, issuer, to)?;
                debug!(basket = %basket, hook = hook.name(), "Manager pre-issue hook passed");
            }
            for module in &settings.module_issuance_hooks {
                let hook = hooks.require(module)?;
                env.with_hook(basket, &self.id, module, |env| {
                    hook.module_issue_hook(env, &self.id, basket, quantity)
                })?;
            }

            let fees = self.calculate_total_fees(env, basket, quantity, true)?;
            let flows = required_component_flows(env, basket, fees.total_quantity, true)?;

            for flow in &flows {
                if flow.equity > Decimal::ZERO {
                    env.pull_into_basket(basket, &self.id, &flow.component, issuer, flow.equity)?;
                    self.component_hooks(env, hooks, basket, fees.total_quantity, &flow.component, true, true)?;
                }
            }
            for flow in &flows {
                if flow.debt > Decimal::ZERO {
                    self.component_hooks(env, hooks, basket, fees.total_quantity, &flow.component, true, false)?;
                    env.invoke_transfer(basket, &self.id, &flow.component, issuer, flow.debt)?;
                }
            }

            self.mint_fees(env, basket, &settings.fee_recipient, &fees)?;
            env.mint_basket(basket, &self.id, to, quantity)?;

            env.emit(ProtocolEvent::BasketIssued {
                basket: basket.clone(),
                issuer: issuer.clone(),
                to: to.clone(),
                quantity,
                manager_fee: fees.manager_fee,
                protocol_fee: fees.protocol_fee,
            });
            info!(
                basket = %basket,
                issuer = %issuer,
                quantity = %quantity,
                manager_fee = %fees.manager_fee,
                protocol_fee = %fees.protocol_fee,
                "Basket issued"
            );
            Ok(())
        })
    }

    /// Burn `quantity` from `redeemer`, collecting the debt share from them
    /// and paying the equity share to `to`.
    pub fn redeem(
        &self,
        env: &mut Env<'_>,
        hooks: &mut HookSet<'_>,
        redeemer: &AccountId,
        basket: &BasketId,
        quantity: Decimal,
        to: &AccountId,
    ) -> Result<(), ModuleError> {
        env.only_valid_and_initialized(basket, &self.id)?;
        if quantity <= Decimal::ZERO {
            return Err(ModuleError::RedeemQuantityZero);
        }
        let settings = self.settings_of(basket)?.clone();

        env.guarded(basket, &self.id, |env| {
            for module in &settings.module_issuance_hooks {
                let hook = hooks.require(module)?;
                env.with_hook(basket, &self.id, module, |env| {
                    hook.module_redeem_hook(env, &self.id, basket, quantity)
                })?;
            }

            env.burn_basket(basket, &self.id, redeemer, quantity)?;

            let fees = self.calculate_total_fees(env, basket, quantity, false)?;
            let flows = required_component_flows(env, basket, fees.total_quantity, false)?;

            for flow in &flows {
                if flow.debt > Decimal::ZERO {
                    env.pull_into_basket(basket, &self.id, &flow.component, redeemer, flow.debt)?;
                    self.component_hooks(env, hooks, basket, fees.total_quantity, &flow.component, false, false)?;
                }
            }
            for flow in &flows {
                if flow.equity > Decimal::ZERO {
                    self.component_hooks(env, hooks, basket, fees.total_quantity, &flow.component, false, true)?;
                    env.invoke_transfer(basket, &self.id, &flow.component, to, flow.equity)?;
                }
            }

            self.mint_fees(env, basket, &settings.fee_recipient, &fees)?;

            env.emit(ProtocolEvent::BasketRedeemed {
                basket: basket.clone(),
                redeemer: redeemer.clone(),
                to: to.clone(),
                quantity,
                manager_fee: fees.manager_fee,
                protocol_fee: fees.protocol_fee,
            });
            info!(
                basket = %basket,
                redeemer = %redeemer,
                quantity = %quantity,
                manager_fee = %fees.manager_fee,
                protocol_fee = %fees.protocol_fee,
                "Basket redeemed"
            );
            Ok(())
        })
    }

    /// Call the component hook of every module holding an external position in `component`
    #[allow(clippy::too_many_arguments)]
    fn component_hooks(
        &self,
        env: &mut Env<'_>,
        hooks: &mut HookSet<'_>,
        basket: &BasketId,
        quantity: Decimal,
        component: &AssetId,
        is_issue: bool,
        is_equity: bool,
    ) -> Result<(), ModuleError> {
        let owners = env.basket(basket)?.external_position_modules(component).to_vec();
        for module in &owners {
            let hook = hooks.require(module)?;
            env.with_hook(basket, &self.id, module, |env| {
                if is_issue {
                    hook.component_issue_hook(env, &self.id, basket, quantity, component, is_equity)
                } else {
                    hook.component_redeem_hook(env, &self.id, basket, quantity, component, is_equity)
                }
            })?;
        }
        Ok(())
    }

    fn mint_fees(
        &self,
        env: &mut Env<'_>,
        basket: &BasketId,
        manager_recipient: &AccountId,
        fees: &FeeBreakdown,
    ) -> Result<(), ModuleError> {
        env.mint_basket(basket, &self.id, manager_recipient, fees.manager_fee)?;
        let protocol_recipient = env.controller.fee_recipient().clone();
        env.mint_basket(basket, &self.id, &protocol_recipient, fees.protocol_fee)
    }
}

/// Sum default and external units per component, split into equity and debt,
/// and scale by `quantity` with basket-favouring rounding
fn required_component_flows(
    env: &Env<'_>,
    basket: &BasketId,
    quantity: Decimal,
    is_issue: bool,
) -> Result<Vec<ComponentFlow>, ModuleError> {
    let state = env.basket(basket)?;
    let mut flows = Vec::with_capacity(state.components().len());

    for component in state.components() {
        let mut equity_unit = state.default_position_real_unit(component)?;
        let mut debt_unit = Decimal::ZERO;
        for module in state.external_position_modules(component) {
            let unit = state.external_position_real_unit(component, module)?;
            if unit > Decimal::ZERO {
                equity_unit += unit;
            } else {
                debt_unit -= unit;
            }
        }

        let (equity, debt) = if is_issue {
            (precise_mul_ceil(equity_unit, quantity)?, precise_mul(debt_unit, quantity)?)
        } else {
            (precise_mul(equity_unit, quantity)?, precise_mul_ceil(debt_unit, quantity)?)
        };
        flows.push(ComponentFlow {
            component: component.clone(),
            equity,
            debt,
        });
    }
    Ok(flows)
}
