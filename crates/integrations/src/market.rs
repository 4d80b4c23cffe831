//! Money market boundary

use basket_core::{AccountId, AssetId, TokenBook};
use rust_decimal::Decimal;
use std::fmt;

use crate::error::MarketStatus;

/// A lending protocol with per-asset markets.
///
/// A market is named by its market token (e.g. `CETH`). Market-token balances
/// live in the shared `TokenBook`, so collateral held by an account is simply
/// its balance of the market token.
pub trait MoneyMarket: Send + Sync + fmt::Debug {
    /// Underlying asset of a listed market
    fn underlying(&self, market: &AssetId) -> Option<AssetId>;

    /// Join each market as a collateral member; one result per market
    fn enter_markets(
        &mut self,
        account: &AccountId,
        markets: &[AssetId],
    ) -> Vec<Result<(), MarketStatus>>;

    /// Leave a market. Refused while debt is owed in it or if the account
    /// would fall short of liquidity without it.
    fn exit_market(
        &mut self,
        tokens: &TokenBook,
        account: &AccountId,
        market: &AssetId,
    ) -> Result<(), MarketStatus>;

    fn is_member(&self, account: &AccountId, market: &AssetId) -> bool;

    /// Supply `amount` of underlying; returns market tokens minted
    fn mint(
        &mut self,
        tokens: &mut TokenBook,
        account: &AccountId,
        market: &AssetId,
        amount: Decimal,
    ) -> Result<Decimal, MarketStatus>;

    /// Withdraw exactly `amount` of underlying, burning market tokens
    fn redeem_underlying(
        &mut self,
        tokens: &mut TokenBook,
        account: &AccountId,
        market: &AssetId,
        amount: Decimal,
    ) -> Result<(), MarketStatus>;

    fn borrow(
        &mut self,
        tokens: &mut TokenBook,
        account: &AccountId,
        market: &AssetId,
        amount: Decimal,
    ) -> Result<(), MarketStatus>;

    fn repay_borrow(
        &mut self,
        tokens: &mut TokenBook,
        account: &AccountId,
        market: &AssetId,
        amount: Decimal,
    ) -> Result<(), MarketStatus>;

    /// Debt as of the last accrual
    fn borrow_balance_stored(&self, account: &AccountId, market: &AssetId) -> Decimal;

    /// Accrue interest, then return the debt
    fn borrow_balance_current(&mut self, account: &AccountId, market: &AssetId) -> Decimal;

    /// Underlying per market token
    fn exchange_rate_stored(&self, market: &AssetId) -> Decimal;
}
