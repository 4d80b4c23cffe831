//! Integration errors

use basket_core::{AccountId, AssetId, MathError, ModuleId, TokenError};
use thiserror::Error;

/// Failure reported by a money market. Any variant is a nonzero status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketStatus {
    #[error("Market not listed: {0}")]
    MarketNotListed(AssetId),

    #[error("Market not entered: {0}")]
    MarketNotEntered(AssetId),

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Outstanding borrow balance in {0}")]
    NonzeroBorrowBalance(AssetId),

    #[error("Insufficient cash in {0}")]
    InsufficientCash(AssetId),

    #[error("Repay exceeds borrow balance")]
    RepayExceedsBorrow,

    #[error("Token transfer failed: {0}")]
    Token(#[from] TokenError),

    #[error("Market math failed: {0}")]
    Math(#[from] MathError),
}

impl MarketStatus {
    /// Numeric status code (never zero)
    pub fn code(&self) -> u32 {
        match self {
            MarketStatus::InsufficientLiquidity => 4,
            MarketStatus::MarketNotEntered(_) => 8,
            MarketStatus::MarketNotListed(_) => 9,
            MarketStatus::NonzeroBorrowBalance(_) => 12,
            MarketStatus::Token(_) => 13,
            MarketStatus::InsufficientCash(_) => 14,
            MarketStatus::RepayExceedsBorrow => 15,
            MarketStatus::Math(_) => 16,
        }
    }
}

/// Errors raised by trade adapters, venues and the adapter registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("Must be valid adapter: {module}/{name}")]
    AdapterNotFound { module: ModuleId, name: String },

    #[error("Integration exists already: {module}/{name}")]
    AdapterExists { module: ModuleId, name: String },

    #[error("Exchange not found: {0}")]
    ExchangeNotFound(AccountId),

    #[error("Invalid trade calldata: {0}")]
    InvalidCalldata(String),

    #[error("Unsupported pair: {from} -> {to}")]
    UnsupportedPair { from: AssetId, to: AssetId },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Math(#[from] MathError),
}
