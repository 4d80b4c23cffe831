//! Basket Integrations
//!
//! Boundaries to the outside world the leverage engine talks to:
//! - `MoneyMarket`: lending protocol (supply collateral, borrow, repay)
//! - `TradeAdapter` + `Exchange`: build a trade call, then execute it at a venue
//! - `IntegrationRegistry`: resolves `(module, adapter name)` to an adapter
//!
//! Deterministic mocks of each are provided for tests and the CLI demo.

mod error;
mod market;
pub mod mock;
mod registry;
mod trade;

pub use error::{IntegrationError, MarketStatus};
pub use market::MoneyMarket;
pub use mock::{MarketConfig, MockExchange, MockMoneyMarket, MockTradeAdapter, SwapCall};
pub use registry::IntegrationRegistry;
pub use trade::{Exchange, ExchangeRegistry, TradeAdapter, TradeCall};
