//! Basket Ledger - Position accounting core
//!
//! This is the HEART of the basket. Every change to what a basket token is a
//! claim on goes through this crate.
//!
//! # Key Types
//! - `BasketLedger`: arena of basket records, keyed by `BasketId`
//! - `BasketState`: supply, position multiplier, components, module states, lock stack
//! - `ComponentPosition`: default (equity) unit plus module-attributed external units
//! - `Position`: real-unit view of a single default or external position
//!
//! Stored units are *virtual*: the real per-token claim is
//! `virtual_unit * position_multiplier`, so supply changes that are not backed by
//! a proportional transfer (fee inflation) are absorbed by the multiplier alone.

pub mod basket;
pub mod error;
pub mod ledger;
pub mod position;

pub use basket::BasketState;
pub use error::LedgerError;
pub use ledger::{BasketLedger, NewBasket};
pub use position::{
    calculate_default_edit_position_unit, ComponentPosition, ExternalPosition, ModuleState,
    Position, PositionKind,
};
