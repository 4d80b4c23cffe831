//! Basket Core - Domain types
//!
//! This crate contains the fundamental types used across the basket workspace:
//! - `AccountId`, `AssetId`, `ModuleId`, `BasketId`: validated identifiers
//! - `precise`: 18-decimal fixed-point arithmetic with explicit rounding
//! - `TokenBook`: fungible balances of every asset the protocol touches

pub mod id;
pub mod precise;
pub mod token;

pub use id::{AccountId, AssetId, BasketId, IdError, ModuleId};
pub use precise::{MathError, PRECISION};
pub use token::{TokenBook, TokenError};
