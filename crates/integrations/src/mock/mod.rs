//! Mock integrations for testing
//!
//! Deterministic in-memory stand-ins for a lending protocol and a DEX.

mod exchange;
mod market;

pub use exchange::{MockExchange, MockTradeAdapter, SwapCall};
pub use market::{MarketConfig, MockMoneyMarket};
