use basket_core::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Streaming fee configuration and accrual clock of one basket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeState {
    pub fee_recipient: AccountId,
    /// Ceiling for `streaming_fee_percentage`, fixed at initialization
    pub max_streaming_fee_percentage: Decimal,
    /// Yearly fee, e.g. 0.02 for 2%
    pub streaming_fee_percentage: Decimal,
    pub last_streaming_fee_timestamp: DateTime<Utc>,
}
