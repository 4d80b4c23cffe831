//! Leverage state and operation parameters

use basket_core::{AssetId, BasketId};
use basket_integrations::TradeAdapter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Market tokens a basket has enabled, in enablement order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledAssets {
    pub collateral_markets: Vec<AssetId>,
    pub borrow_markets: Vec<AssetId>,
}

impl EnabledAssets {
    pub fn is_collateral(&self, market: &AssetId) -> bool {
        self.collateral_markets.contains(market)
    }

    pub fn is_borrow(&self, market: &AssetId) -> bool {
        self.borrow_markets.contains(market)
    }

    pub fn uses(&self, market: &AssetId) -> bool {
        self.is_collateral(market) || self.is_borrow(market)
    }
}

/// Borrow, trade into collateral, supply the collateral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverParams {
    pub borrow_asset: AssetId,
    pub collateral_asset: AssetId,
    /// Borrow quantity per basket token
    pub borrow_quantity: Decimal,
    /// Minimum collateral received per basket token
    pub min_receive_quantity: Decimal,
    pub adapter: String,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// Redeem collateral, trade into the borrowed asset, repay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleverParams {
    pub collateral_asset: AssetId,
    pub repay_asset: AssetId,
    /// Collateral redeemed per basket token
    pub redeem_quantity: Decimal,
    /// Minimum repay asset received per basket token
    pub min_repay_quantity: Decimal,
    pub adapter: String,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// Redeem collateral and repay the whole current borrow balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleverToZeroParams {
    pub collateral_asset: AssetId,
    pub repay_asset: AssetId,
    /// Collateral redeemed per basket token
    pub redeem_quantity: Decimal,
    pub adapter: String,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// Everything a lever or delever needs once validated
#[derive(Debug, Clone)]
pub(crate) struct ActionInfo {
    pub basket: BasketId,
    pub adapter_name: String,
    pub adapter: Arc<dyn TradeAdapter>,
    pub supply: Decimal,
    pub notional_send: Decimal,
    pub min_notional_receive: Decimal,
    pub pre_trade_receive_balance: Decimal,
    pub collateral_market: AssetId,
    pub borrow_market: AssetId,
}
