//! Basket Leverage Engine
//!
//! Borrows against basket-held collateral in a money market, trades the
//! proceeds through a named trade adapter and keeps the ledger in step:
//!
//! - collateral is a *default* position in the market token
//!   (`market-token balance / supply`)
//! - debt is an *external* position in the borrowed underlying, owned by this
//!   module (`-(borrow balance / supply)`, rounded away from zero)
//!
//! `sync` re-derives both from the money market after events the engine did
//! not drive itself (interest accrual, third-party liquidation).

mod engine;
mod hooks;
mod module;
mod state;

#[cfg(test)]
mod testing;

pub use module::LeverageModule;
pub use state::{DeleverParams, DeleverToZeroParams, EnabledAssets, LeverParams};

/// Index of the protocol trade fee in the controller fee table
pub const PROTOCOL_TRADE_FEE_INDEX: usize = 0;
