//! Mock exchange and the trade adapter that targets it

use basket_core::precise::precise_mul;
use basket_core::{AccountId, AssetId, TokenBook};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::IntegrationError;
use crate::trade::{Exchange, TradeAdapter, TradeCall};

/// Calldata understood by `MockExchange`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapCall {
    pub from: AssetId,
    pub to: AssetId,
    pub quantity: Decimal,
    pub min_quantity: Decimal,
    pub destination: AccountId,
}

/// Fixed-rate venue. Pays out of its own balances.
///
/// The venue does not enforce `min_quantity`, so the caller's own slippage
/// check is what stands between a bad fill and the basket.
#[derive(Debug, Clone)]
pub struct MockExchange {
    address: AccountId,
    rates: HashMap<(AssetId, AssetId), Decimal>,
    output_override: Option<Decimal>,
}

impl MockExchange {
    pub fn new(address: AccountId) -> Self {
        Self {
            address,
            rates: HashMap::new(),
            output_override: None,
        }
    }

    /// Units of `to` paid per unit of `from`
    pub fn set_rate(&mut self, from: AssetId, to: AssetId, rate: Decimal) {
        self.rates.insert((from, to), rate);
    }

    /// Pay exactly `output` on every trade regardless of rate
    pub fn set_output_override(&mut self, output: Option<Decimal>) {
        self.output_override = output;
    }

    fn quote(&self, swap: &SwapCall) -> Result<Decimal, IntegrationError> {
        if let Some(output) = self.output_override {
            return Ok(output);
        }
        let rate = self
            .rates
            .get(&(swap.from.clone(), swap.to.clone()))
            .ok_or_else(|| IntegrationError::UnsupportedPair {
                from: swap.from.clone(),
                to: swap.to.clone(),
            })?;
        Ok(precise_mul(swap.quantity, *rate)?)
    }
}

impl Exchange for MockExchange {
    fn address(&self) -> &AccountId {
        &self.address
    }

    fn invoke(
        &mut self,
        tokens: &mut TokenBook,
        caller: &AccountId,
        _value: Decimal,
        calldata: &serde_json::Value,
    ) -> Result<(), IntegrationError> {
        let swap: SwapCall = serde_json::from_value(calldata.clone())
            .map_err(|e| IntegrationError::InvalidCalldata(e.to_string()))?;
        let output = self.quote(&swap)?;

        tokens.transfer(&swap.from, caller, &self.address, swap.quantity)?;
        tokens.transfer(&swap.to, &self.address, &swap.destination, output)?;
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Exchange> {
        Box::new(self.clone())
    }
}

/// Adapter that encodes a `SwapCall` for a `MockExchange`
#[derive(Debug, Clone)]
pub struct MockTradeAdapter {
    name: String,
    exchange: AccountId,
}

impl MockTradeAdapter {
    pub fn new(name: &str, exchange: AccountId) -> Self {
        Self {
            name: name.to_string(),
            exchange,
        }
    }
}

impl TradeAdapter for MockTradeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn spender(&self) -> &AccountId {
        &self.exchange
    }

    fn get_trade_calldata(
        &self,
        from: &AssetId,
        to: &AssetId,
        destination: &AccountId,
        quantity: Decimal,
        min_quantity: Decimal,
        _data: &[u8],
    ) -> Result<TradeCall, IntegrationError> {
        let swap = SwapCall {
            from: from.clone(),
            to: to.clone(),
            quantity,
            min_quantity,
            destination: destination.clone(),
        };
        let calldata = serde_json::to_value(&swap)
            .map_err(|e| IntegrationError::InvalidCalldata(e.to_string()))?;

        Ok(TradeCall {
            target: self.exchange.clone(),
            value: Decimal::ZERO,
            calldata,
        })
    }
}
