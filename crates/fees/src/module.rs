//! Streaming fee module

use basket_bus::ProtocolEvent;
use basket_core::precise::{mul_div_down, precise_mul};
use basket_core::{AccountId, BasketId, MathError, ModuleId};
use basket_kernel::{Env, ModuleError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::state::FeeState;
use crate::PROTOCOL_STREAMING_FEE_INDEX;

/// 365.25 days
pub const ONE_YEAR_IN_SECONDS: i64 = 31_557_600;

#[derive(Debug, Clone)]
pub struct StreamingFeeModule {
    id: ModuleId,
    fee_states: HashMap<BasketId, FeeState>,
}

impl StreamingFeeModule {
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            fee_states: HashMap::new(),
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn fee_state(&self, basket: &BasketId) -> Option<&FeeState> {
        self.fee_states.get(basket)
    }

    fn state_of(&self, basket: &BasketId) -> Result<&FeeState, ModuleError> {
        self.fee_states
            .get(basket)
            .ok_or(ModuleError::BasketNotInitialized)
    }

    // === Lifecycle ===

    /// Start charging `settings`; the accrual clock starts now
    pub fn initialize(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        fee_recipient: AccountId,
        max_streaming_fee_percentage: Decimal,
        streaming_fee_percentage: Decimal,
    ) -> Result<(), ModuleError> {
        env.only_manager(basket, caller)?;
        env.only_valid_and_pending(basket, &self.id)?;
        if max_streaming_fee_percentage >= Decimal::ONE {
            return Err(ModuleError::MaxFeeTooHigh);
        }
        if streaming_fee_percentage > max_streaming_fee_percentage {
            return Err(ModuleError::FeeAboveMax);
        }

        self.fee_states.insert(
            basket.clone(),
            FeeState {
                fee_recipient,
                max_streaming_fee_percentage,
                streaming_fee_percentage,
                last_streaming_fee_timestamp: env.now,
            },
        );
        env.ledger.initialize_module(basket, &self.id)?;
        env.emit(ProtocolEvent::ModuleInitialized {
            basket: basket.clone(),
            module: self.id.clone(),
        });

        info!(basket = %basket, fee = %streaming_fee_percentage, "Streaming fee initialized");
        Ok(())
    }

    /// Forget the basket's fee state without a final accrual
    pub fn remove_module(&mut self, env: &mut Env<'_>, basket: &BasketId) -> Result<(), ModuleError> {
        env.only_valid_and_initialized(basket, &self.id)?;
        self.fee_states.remove(basket);
        info!(basket = %basket, module = %self.id, "Streaming fee removed");
        Ok(())
    }

    // === Accrual ===

    /// Fraction of supply owed since the last accrual
    pub fn get_fee(&self, env: &Env<'_>, basket: &BasketId) -> Result<Decimal, ModuleError> {
        let state = self.state_of(basket)?;
        let elapsed = (env.now - state.last_streaming_fee_timestamp)
            .num_seconds()
            .max(0);
        Ok(mul_div_down(
            Decimal::from(elapsed),
            state.streaming_fee_percentage,
            Decimal::from(ONE_YEAR_IN_SECONDS),
        )?)
    }

    /// Mint the fee owed since the last accrual and dilute the multiplier.
    ///
    /// Returns `(manager fee, protocol fee)` in basket tokens.
    pub fn accrue_fee(
        &mut self,
        env: &mut Env<'_>,
        basket: &BasketId,
    ) -> Result<(Decimal, Decimal), ModuleError> {
        env.only_valid_and_initialized(basket, &self.id)?;
        let id = self.id.clone();
        env.guarded(basket, &id, |env| self.accrue(env, basket))
    }

    fn accrue(&mut self, env: &mut Env<'_>, basket: &BasketId) -> Result<(Decimal, Decimal), ModuleError> {
        let state = self.state_of(basket)?.clone();
        let mut manager_fee = Decimal::ZERO;
        let mut protocol_fee = Decimal::ZERO;

        if state.streaming_fee_percentage > Decimal::ZERO {
            let inflation = self.get_fee(env, basket)?;
            let supply = env.total_supply(basket)?;
            let fee_quantity = fee_inflation(inflation, supply)?;

            if fee_quantity > Decimal::ZERO {
                let split = env
                    .controller
                    .module_fee(&self.id, PROTOCOL_STREAMING_FEE_INDEX);
                protocol_fee = precise_mul(fee_quantity, split)?;
                manager_fee = fee_quantity - protocol_fee;

                let protocol_recipient = env.controller.fee_recipient().clone();
                env.mint_basket(basket, &self.id, &protocol_recipient, protocol_fee)?;
                env.mint_basket(basket, &self.id, &state.fee_recipient, manager_fee)?;

                let multiplier = env.ledger.edit_position_multiplier(
                    basket,
                    &self.id,
                    supply,
                    supply + fee_quantity,
                )?;
                debug!(basket = %basket, inflation = %inflation, multiplier = %multiplier, "Fee inflation applied");
            }
        }

        if let Some(state) = self.fee_states.get_mut(basket) {
            state.last_streaming_fee_timestamp = env.now;
        }
        env.emit(ProtocolEvent::FeeActualized {
            basket: basket.clone(),
            manager_fee,
            protocol_fee,
            timestamp: env.now,
        });
        info!(basket = %basket, manager_fee = %manager_fee, protocol_fee = %protocol_fee, "Fee actualized");
        Ok((manager_fee, protocol_fee))
    }

    // === Manager updates ===

    /// Accrue at the old rate, then switch to `new_fee`
    pub fn update_streaming_fee(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        new_fee: Decimal,
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        if new_fee >= self.state_of(basket)?.max_streaming_fee_percentage {
            return Err(ModuleError::FeeNotLessThanMax);
        }
        self.accrue_fee(env, basket)?;

        if let Some(state) = self.fee_states.get_mut(basket) {
            state.streaming_fee_percentage = new_fee;
        }
        env.emit(ProtocolEvent::StreamingFeeUpdated {
            basket: basket.clone(),
            new_fee,
        });
        Ok(())
    }

    /// Accrue to the old recipient, then redirect future fees
    pub fn update_fee_recipient(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        new_recipient: AccountId,
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        self.accrue_fee(env, basket)?;

        if let Some(state) = self.fee_states.get_mut(basket) {
            state.fee_recipient = new_recipient.clone();
        }
        env.emit(ProtocolEvent::FeeRecipientUpdated {
            basket: basket.clone(),
            module: self.id.clone(),
            new_recipient,
        });
        Ok(())
    }
}

/// `inflation * supply / (1 - inflation)`: the mint that leaves the new
/// holders with exactly `inflation` of the grown supply
fn fee_inflation(inflation: Decimal, supply: Decimal) -> Result<Decimal, ModuleError> {
    if inflation.is_zero() || supply.is_zero() {
        return Ok(Decimal::ZERO);
    }
    if inflation >= Decimal::ONE {
        return Err(MathError::Overflow("streaming fee inflation").into());
    }
    Ok(mul_div_down(inflation, supply, Decimal::ONE - inflation)?)
}
