//! Basket RPC - transaction facade and CLI orchestrator
//!
//! `AppContext` runs every protocol operation atomically and publishes the
//! committed events; `commands` holds the CLI handlers.

pub mod commands;
pub mod context;

pub use context::{
    AppContext, ContextError, CoreState, MockContext, ProtocolState, ISSUANCE_MODULE,
    LEVERAGE_MODULE, STREAMING_FEE_MODULE,
};
