//! Basket Streaming Fee
//!
//! Charges a yearly percentage by minting new basket tokens to the manager
//! and the protocol, then shrinking the position multiplier so every holder
//! is diluted without any component leaving the basket.

mod module;
mod state;

pub use module::{StreamingFeeModule, ONE_YEAR_IN_SECONDS};
pub use state::FeeState;

/// Index of the protocol's share of streaming fees in the controller fee table
pub const PROTOCOL_STREAMING_FEE_INDEX: usize = 0;
