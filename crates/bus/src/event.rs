//! Protocol events for pub/sub distribution

use basket_core::{AccountId, AssetId, BasketId, ModuleId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

/// Events emitted by the protocol engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
pub enum ProtocolEvent {
    // === Basket lifecycle ===
    BasketCreated {
        basket: BasketId,
        manager: AccountId,
        components: Vec<AssetId>,
    },

    ModuleAdded {
        basket: BasketId,
        module: ModuleId,
    },

    ModuleInitialized {
        basket: BasketId,
        module: ModuleId,
    },

    ModuleRemoved {
        basket: BasketId,
        module: ModuleId,
    },

    // === Leverage ===
    LeverageIncreased {
        basket: BasketId,
        borrow_asset: AssetId,
        collateral_asset: AssetId,
        exchange_adapter: String,
        total_borrow_amount: Decimal,
        total_received_amount: Decimal,
        protocol_fee: Decimal,
    },

    LeverageDecreased {
        basket: BasketId,
        collateral_asset: AssetId,
        repay_asset: AssetId,
        exchange_adapter: String,
        total_redeem_amount: Decimal,
        total_repay_amount: Decimal,
        protocol_fee: Decimal,
    },

    CollateralAssetsUpdated {
        basket: BasketId,
        added: bool,
        assets: Vec<AssetId>,
    },

    BorrowAssetsUpdated {
        basket: BasketId,
        added: bool,
        assets: Vec<AssetId>,
    },

    MoneyMarketAdded {
        market: AssetId,
        underlying: AssetId,
    },

    MoneyMarketRemoved {
        market: AssetId,
        underlying: AssetId,
    },

    BasketStatusUpdated {
        basket: BasketId,
        added: bool,
    },

    AnyBasketAllowedUpdated {
        any_basket_allowed: bool,
    },

    // === Issuance ===
    BasketIssued {
        basket: BasketId,
        issuer: AccountId,
        to: AccountId,
        quantity: Decimal,
        manager_fee: Decimal,
        protocol_fee: Decimal,
    },

    BasketRedeemed {
        basket: BasketId,
        redeemer: AccountId,
        to: AccountId,
        quantity: Decimal,
        manager_fee: Decimal,
        protocol_fee: Decimal,
    },

    IssueFeeUpdated {
        basket: BasketId,
        new_fee: Decimal,
    },

    RedeemFeeUpdated {
        basket: BasketId,
        new_fee: Decimal,
    },

    // === Fees ===
    FeeActualized {
        basket: BasketId,
        manager_fee: Decimal,
        protocol_fee: Decimal,
        timestamp: DateTime<Utc>,
    },

    StreamingFeeUpdated {
        basket: BasketId,
        new_fee: Decimal,
    },

    /// Emitted by any fee-charging module
    FeeRecipientUpdated {
        basket: BasketId,
        module: ModuleId,
        new_recipient: AccountId,
    },
}

impl ProtocolEvent {
    /// Variant name, e.g. `"LeverageIncreased"`
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Basket the event concerns, if any
    pub fn basket(&self) -> Option<&BasketId> {
        match self {
            Self::BasketCreated { basket, .. }
            | Self::ModuleAdded { basket, .. }
            | Self::ModuleInitialized { basket, .. }
            | Self::ModuleRemoved { basket, .. }
            | Self::LeverageIncreased { basket, .. }
            | Self::LeverageDecreased { basket, .. }
            | Self::CollateralAssetsUpdated { basket, .. }
            | Self::BorrowAssetsUpdated { basket, .. }
            | Self::BasketStatusUpdated { basket, .. }
            | Self::BasketIssued { basket, .. }
            | Self::BasketRedeemed { basket, .. }
            | Self::IssueFeeUpdated { basket, .. }
            | Self::RedeemFeeUpdated { basket, .. }
            | Self::FeeActualized { basket, .. }
            | Self::StreamingFeeUpdated { basket, .. }
            | Self::FeeRecipientUpdated { basket, .. } => Some(basket),
            Self::MoneyMarketAdded { .. }
            | Self::MoneyMarketRemoved { .. }
            | Self::AnyBasketAllowedUpdated { .. } => None,
        }
    }
}
