//! Trade boundary: adapters build calls, exchanges execute them

use basket_core::{AccountId, AssetId, TokenBook};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::IntegrationError;

/// A call to execute at a venue on behalf of a basket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCall {
    pub target: AccountId,
    pub value: Decimal,
    pub calldata: serde_json::Value,
}

/// Translates a trade request into a venue-specific call
pub trait TradeAdapter: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Account that pulls the source token during execution
    fn spender(&self) -> &AccountId;

    fn get_trade_calldata(
        &self,
        from: &AssetId,
        to: &AssetId,
        destination: &AccountId,
        quantity: Decimal,
        min_quantity: Decimal,
        data: &[u8],
    ) -> Result<TradeCall, IntegrationError>;
}

/// A trading venue that executes calldata against the token book.
///
/// Whatever the venue returns is never trusted; callers measure the
/// received amount by balance delta.
pub trait Exchange: Send + Sync + fmt::Debug {
    fn address(&self) -> &AccountId;

    fn invoke(
        &mut self,
        tokens: &mut TokenBook,
        caller: &AccountId,
        value: Decimal,
        calldata: &serde_json::Value,
    ) -> Result<(), IntegrationError>;

    fn box_clone(&self) -> Box<dyn Exchange>;
}

impl Clone for Box<dyn Exchange> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Venues by address
#[derive(Debug, Clone, Default)]
pub struct ExchangeRegistry {
    venues: HashMap<AccountId, Box<dyn Exchange>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a venue under its own address, replacing any previous one
    pub fn register(&mut self, exchange: Box<dyn Exchange>) {
        self.venues.insert(exchange.address().clone(), exchange);
    }

    pub fn get_mut(&mut self, address: &AccountId) -> Result<&mut dyn Exchange, IntegrationError> {
        match self.venues.get_mut(address) {
            Some(venue) => Ok(venue.as_mut()),
            None => Err(IntegrationError::ExchangeNotFound(address.clone())),
        }
    }

    pub fn len(&self) -> usize {
        self.venues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}
