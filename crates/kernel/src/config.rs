//! Protocol configuration
//!
//! Every parameter has a default, so a config file only needs the fields it
//! overrides.

use basket_core::AccountId;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must be in [0, 1): {value}")]
    OutOfRange { field: &'static str, value: Decimal },
}

/// Protocol-wide parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    // === Accounts ===
    /// Controller owner (money-market registry, basket allow-list, fees)
    #[serde(default = "default_owner")]
    pub owner: AccountId,

    /// Receives every protocol fee
    #[serde(default = "default_fee_recipient")]
    pub fee_recipient: AccountId,

    // === Protocol fees ===
    /// Share of each lever/delever trade output taken as protocol fee
    #[serde(default)]
    pub leverage_protocol_fee: Decimal,

    /// Share of issue/redeem fees routed to the protocol
    #[serde(default)]
    pub issuance_protocol_fee_split: Decimal,

    /// Share of streaming-fee inflation routed to the protocol
    #[serde(default = "default_streaming_protocol_fee_split")]
    pub streaming_protocol_fee_split: Decimal,

    // === Runtime ===
    /// Clock value the protocol starts at
    #[serde(default = "default_genesis")]
    pub genesis: DateTime<Utc>,

    /// Capacity of the event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

// Default value functions for serde
fn default_owner() -> AccountId {
    AccountId::from("PROTOCOL_OWNER")
}

fn default_fee_recipient() -> AccountId {
    AccountId::from("PROTOCOL_TREASURY")
}

fn default_streaming_protocol_fee_split() -> Decimal {
    Decimal::new(15, 2) // 15%
}

fn default_genesis() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0)
        .single()
        .unwrap_or_default()
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            fee_recipient: default_fee_recipient(),
            leverage_protocol_fee: Decimal::ZERO,
            issuance_protocol_fee_split: Decimal::ZERO,
            streaming_protocol_fee_split: default_streaming_protocol_fee_split(),
            genesis: default_genesis(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every fraction is in `[0, 1)`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            ("leverage_protocol_fee", self.leverage_protocol_fee),
            ("issuance_protocol_fee_split", self.issuance_protocol_fee_split),
            ("streaming_protocol_fee_split", self.streaming_protocol_fee_split),
        ];
        for (field, value) in fractions {
            if value < Decimal::ZERO || value >= Decimal::ONE {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }
}
