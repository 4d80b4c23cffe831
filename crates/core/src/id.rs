//! Identifiers - Type-safe codes for accounts, assets, modules and baskets
//!
//! Every identity in the protocol is a short upper-case code. Codes are
//! validated once at construction, so the rest of the workspace can compare
//! and hash them freely.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of an identifier code
pub const MAX_ID_LEN: usize = 32;

/// Errors that can occur when parsing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Empty identifier")]
    EmptyCode,

    #[error("Identifier too long (max 32 chars): {0}")]
    TooLong(String),

    #[error("Invalid identifier format: {0}")]
    InvalidFormat(String),
}

fn normalize(raw: &str) -> Result<String, IdError> {
    let s = raw.trim().to_uppercase();

    if s.is_empty() {
        return Err(IdError::EmptyCode);
    }

    if s.len() > MAX_ID_LEN {
        return Err(IdError::TooLong(s));
    }

    // Alphanumeric plus '_' and '-'
    if !s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(IdError::InvalidFormat(s));
    }

    Ok(s)
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a validated identifier (trimmed and upper-cased)
            pub fn new(code: &str) -> Result<Self, IdError> {
                normalize(code).map(Self)
            }

            /// Returns the code as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(&s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s).unwrap_or_else(|_| Self(s.trim().to_uppercase()))
            }
        }
    };
}

define_id!(
    /// A holder of token balances (users, managers, baskets, market reserves, venues)
    AccountId
);

define_id!(
    /// A fungible asset (underlying tokens, market tokens, basket tokens)
    AssetId
);

define_id!(
    /// A protocol module (leverage, issuance, streaming fee)
    ModuleId
);

define_id!(
    /// A basket. The same code names the basket's token and the account
    /// that custodies its components.
    BasketId
);

impl BasketId {
    /// Account that holds the basket's components
    pub fn account(&self) -> AccountId {
        AccountId(self.0.clone())
    }

    /// Asset code of the basket token itself
    pub fn asset(&self) -> AssetId {
        AssetId(self.0.clone())
    }
}

impl AssetId {
    /// Reserve account for an asset that is also a venue (e.g. a money-market token)
    pub fn reserve_account(&self) -> AccountId {
        AccountId(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let asset: AssetId = "ceth".parse().unwrap();
        assert_eq!(asset.as_str(), "CETH");
        assert_eq!(asset.to_string(), "CETH");
    }

    #[test]
    fn test_empty_code_error() {
        let result: Result<ModuleId, _> = "  ".parse();
        assert!(matches!(result, Err(IdError::EmptyCode)));
    }

    #[test]
    fn test_too_long_error() {
        let result = AccountId::new("A_VERY_LONG_ACCOUNT_NAME_THAT_KEEPS_GOING");
        assert!(matches!(result, Err(IdError::TooLong(_))));
    }

    #[test]
    fn test_invalid_format_error() {
        let result = AssetId::new("ETH/USD");
        assert!(matches!(result, Err(IdError::InvalidFormat(_))));
    }

    #[test]
    fn test_basket_account_and_asset_share_code() {
        let basket = BasketId::from("eth2x");
        assert_eq!(basket.account().as_str(), "ETH2X");
        assert_eq!(basket.asset().as_str(), "ETH2X");
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let parsed: Result<AssetId, _> = serde_json::from_str("\"BAD CODE\"");
        assert!(parsed.is_err());

        let ok: AssetId = serde_json::from_str("\"usdc\"").unwrap();
        assert_eq!(ok, AssetId::from("USDC"));
    }
}
