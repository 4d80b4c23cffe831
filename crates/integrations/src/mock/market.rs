//! Mock money market
//!
//! Compound-style bookkeeping: market tokens are minted at a fixed exchange
//! rate, underlying sits in the market's reserve account, and borrowing is
//! limited by collateral value times collateral factor across entered markets.
//! Interest is queued explicitly and only lands on the next accrual.

use basket_core::precise::{precise_div, precise_div_ceil};
use basket_core::{AccountId, AssetId, TokenBook};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::error::MarketStatus;
use crate::market::MoneyMarket;

/// Static parameters of one mock market
#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    pub underlying: AssetId,
    /// Underlying per market token
    pub exchange_rate: Decimal,
    pub collateral_factor: Decimal,
    /// Price of one underlying unit in a common numeraire
    pub price: Decimal,
}

/// Liquidation bonus paid to liquidators
const LIQUIDATION_INCENTIVE: Decimal = Decimal::from_parts(108, 0, 0, false, 2);

/// In-memory money market
#[derive(Debug, Clone, Default)]
pub struct MockMoneyMarket {
    markets: HashMap<AssetId, MarketConfig>,
    memberships: HashMap<AccountId, Vec<AssetId>>,
    borrows: HashMap<(AccountId, AssetId), Decimal>,
    pending_interest: HashMap<(AccountId, AssetId), Decimal>,
}

impl MockMoneyMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a market
    pub fn list_market(&mut self, market: AssetId, config: MarketConfig) {
        self.markets.insert(market, config);
    }

    pub fn set_price(&mut self, market: &AssetId, price: Decimal) {
        if let Some(config) = self.markets.get_mut(market) {
            config.price = price;
        }
    }

    /// Queue interest that lands on the next `borrow_balance_current`
    pub fn queue_interest(&mut self, account: &AccountId, market: &AssetId, amount: Decimal) {
        *self
            .pending_interest
            .entry((account.clone(), market.clone()))
            .or_insert(Decimal::ZERO) += amount;
    }

    /// Third-party liquidation: `liquidator` repays `repay_amount` of the
    /// borrower's debt in `borrowed_market` and seizes discounted collateral
    /// market tokens from `collateral_market`.
    pub fn liquidate_borrow(
        &mut self,
        tokens: &mut TokenBook,
        liquidator: &AccountId,
        borrower: &AccountId,
        borrowed_market: &AssetId,
        repay_amount: Decimal,
        collateral_market: &AssetId,
    ) -> Result<Decimal, MarketStatus> {
        let borrowed = self.config(borrowed_market)?.clone();
        let collateral = self.config(collateral_market)?.clone();

        let owed = self.borrow_balance_stored(borrower, borrowed_market);
        if repay_amount > owed {
            return Err(MarketStatus::RepayExceedsBorrow);
        }

        tokens.transfer(
            &borrowed.underlying,
            liquidator,
            &borrowed_market.reserve_account(),
            repay_amount,
        )?;
        self.borrows
            .insert((borrower.clone(), borrowed_market.clone()), owed - repay_amount);

        let seize_value = repay_amount * borrowed.price * LIQUIDATION_INCENTIVE;
        let seize_tokens =
            precise_div(seize_value, collateral.price * collateral.exchange_rate)?;
        tokens.transfer(collateral_market, borrower, liquidator, seize_tokens)?;

        debug!(
            borrower = %borrower,
            repaid = %repay_amount,
            seized = %seize_tokens,
            "Mock liquidation"
        );
        Ok(seize_tokens)
    }

    fn config(&self, market: &AssetId) -> Result<&MarketConfig, MarketStatus> {
        self.markets
            .get(market)
            .ok_or_else(|| MarketStatus::MarketNotListed(market.clone()))
    }

    /// Collateral value minus borrow value, after an optional hypothetical change
    fn liquidity(
        &self,
        tokens: &TokenBook,
        account: &AccountId,
        exclude_collateral: Option<&AssetId>,
        extra_borrow: Option<(&AssetId, Decimal)>,
        redeem_tokens: Option<(&AssetId, Decimal)>,
    ) -> Decimal {
        let mut collateral_value = Decimal::ZERO;
        for market in self.memberships.get(account).into_iter().flatten() {
            if Some(market) == exclude_collateral {
                continue;
            }
            let Some(config) = self.markets.get(market) else {
                continue;
            };
            let mut balance = tokens.balance_of(market, account);
            if let Some((redeemed, amount)) = redeem_tokens {
                if redeemed == market {
                    balance -= amount;
                }
            }
            collateral_value +=
                balance * config.exchange_rate * config.price * config.collateral_factor;
        }

        let mut borrow_value = Decimal::ZERO;
        for ((holder, market), amount) in &self.borrows {
            if holder != account {
                continue;
            }
            if let Some(config) = self.markets.get(market) {
                borrow_value += *amount * config.price;
            }
        }
        if let Some((market, amount)) = extra_borrow {
            if let Some(config) = self.markets.get(market) {
                borrow_value += amount * config.price;
            }
        }

        collateral_value - borrow_value
    }

    fn join(&mut self, account: &AccountId, market: &AssetId) {
        let joined = self.memberships.entry(account.clone()).or_default();
        if !joined.contains(market) {
            joined.push(market.clone());
        }
    }
}

impl MoneyMarket for MockMoneyMarket {
    fn underlying(&self, market: &AssetId) -> Option<AssetId> {
        self.markets.get(market).map(|c| c.underlying.clone())
    }

    fn enter_markets(
        &mut self,
        account: &AccountId,
        markets: &[AssetId],
    ) -> Vec<Result<(), MarketStatus>> {
        markets
            .iter()
            .map(|market| {
                self.config(market)?;
                self.join(account, market);
                Ok(())
            })
            .collect()
    }

    fn exit_market(
        &mut self,
        tokens: &TokenBook,
        account: &AccountId,
        market: &AssetId,
    ) -> Result<(), MarketStatus> {
        self.config(market)?;
        if !self.is_member(account, market) {
            return Ok(());
        }
        if self.borrow_balance_stored(account, market) > Decimal::ZERO {
            return Err(MarketStatus::NonzeroBorrowBalance(market.clone()));
        }
        if self.liquidity(tokens, account, Some(market), None, None) < Decimal::ZERO {
            return Err(MarketStatus::InsufficientLiquidity);
        }
        if let Some(joined) = self.memberships.get_mut(account) {
            joined.retain(|m| m != market);
        }
        Ok(())
    }

    fn is_member(&self, account: &AccountId, market: &AssetId) -> bool {
        self.memberships
            .get(account)
            .is_some_and(|joined| joined.contains(market))
    }

    fn mint(
        &mut self,
        tokens: &mut TokenBook,
        account: &AccountId,
        market: &AssetId,
        amount: Decimal,
    ) -> Result<Decimal, MarketStatus> {
        let config = self.config(market)?.clone();
        let minted = precise_div(amount, config.exchange_rate)?;
        tokens.transfer(&config.underlying, account, &market.reserve_account(), amount)?;
        tokens.mint(market, account, minted)?;
        Ok(minted)
    }

    fn redeem_underlying(
        &mut self,
        tokens: &mut TokenBook,
        account: &AccountId,
        market: &AssetId,
        amount: Decimal,
    ) -> Result<(), MarketStatus> {
        let config = self.config(market)?.clone();
        let burned = precise_div_ceil(amount, config.exchange_rate)?;
        let reserve = market.reserve_account();

        if tokens.balance_of(&config.underlying, &reserve) < amount {
            return Err(MarketStatus::InsufficientCash(market.clone()));
        }
        if self.is_member(account, market)
            && self.liquidity(tokens, account, None, None, Some((market, burned))) < Decimal::ZERO
        {
            return Err(MarketStatus::InsufficientLiquidity);
        }

        tokens.burn(market, account, burned)?;
        tokens.transfer(&config.underlying, &reserve, account, amount)?;
        Ok(())
    }

    fn borrow(
        &mut self,
        tokens: &mut TokenBook,
        account: &AccountId,
        market: &AssetId,
        amount: Decimal,
    ) -> Result<(), MarketStatus> {
        let config = self.config(market)?.clone();
        let reserve = market.reserve_account();

        if tokens.balance_of(&config.underlying, &reserve) < amount {
            return Err(MarketStatus::InsufficientCash(market.clone()));
        }
        if self.liquidity(tokens, account, None, Some((market, amount)), None) < Decimal::ZERO {
            return Err(MarketStatus::InsufficientLiquidity);
        }

        // Borrowing enters the market implicitly
        self.join(account, market);
        tokens.transfer(&config.underlying, &reserve, account, amount)?;
        *self
            .borrows
            .entry((account.clone(), market.clone()))
            .or_insert(Decimal::ZERO) += amount;
        Ok(())
    }

    fn repay_borrow(
        &mut self,
        tokens: &mut TokenBook,
        account: &AccountId,
        market: &AssetId,
        amount: Decimal,
    ) -> Result<(), MarketStatus> {
        let config = self.config(market)?.clone();
        let owed = self.borrow_balance_stored(account, market);
        if amount > owed {
            return Err(MarketStatus::RepayExceedsBorrow);
        }

        tokens.transfer(&config.underlying, account, &market.reserve_account(), amount)?;
        self.borrows
            .insert((account.clone(), market.clone()), owed - amount);
        Ok(())
    }

    fn borrow_balance_stored(&self, account: &AccountId, market: &AssetId) -> Decimal {
        self.borrows
            .get(&(account.clone(), market.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn borrow_balance_current(&mut self, account: &AccountId, market: &AssetId) -> Decimal {
        let key = (account.clone(), market.clone());
        if let Some(interest) = self.pending_interest.remove(&key) {
            if interest > Decimal::ZERO {
                *self.borrows.entry(key).or_insert(Decimal::ZERO) += interest;
            }
        }
        self.borrow_balance_stored(account, market)
    }

    fn exchange_rate_stored(&self, market: &AssetId) -> Decimal {
        self.markets
            .get(market)
            .map(|c| c.exchange_rate)
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ceth() -> AssetId {
        AssetId::from("CETH")
    }

    fn cusdc() -> AssetId {
        AssetId::from("CUSDC")
    }

    fn alice() -> AccountId {
        AccountId::from("ALICE")
    }

    fn setup() -> (MockMoneyMarket, TokenBook) {
        let mut market = MockMoneyMarket::new();
        market.list_market(
            ceth(),
            MarketConfig {
                underlying: AssetId::from("ETH"),
                exchange_rate: dec!(1),
                collateral_factor: dec!(0.75),
                price: dec!(1000),
            },
        );
        market.list_market(
            cusdc(),
            MarketConfig {
                underlying: AssetId::from("USDC"),
                exchange_rate: dec!(1),
                collateral_factor: dec!(0.75),
                price: dec!(1),
            },
        );

        let mut tokens = TokenBook::new();
        tokens.mint(&AssetId::from("ETH"), &alice(), dec!(1)).unwrap();
        tokens
            .mint(&AssetId::from("USDC"), &cusdc().reserve_account(), dec!(10000))
            .unwrap();
        (market, tokens)
    }

    #[test]
    fn test_mint_and_borrow_within_liquidity() {
        let (mut market, mut tokens) = setup();
        let minted = market.mint(&mut tokens, &alice(), &ceth(), dec!(1)).unwrap();
        assert_eq!(minted, dec!(1));

        let entered = market.enter_markets(&alice(), &[ceth()]);
        assert!(entered.iter().all(|r| r.is_ok()));

        market.borrow(&mut tokens, &alice(), &cusdc(), dec!(600)).unwrap();
        assert_eq!(market.borrow_balance_stored(&alice(), &cusdc()), dec!(600));
        assert_eq!(tokens.balance_of(&AssetId::from("USDC"), &alice()), dec!(600));

        // 1 ETH * 1000 * 0.75 = 750 of borrowing power
        let over = market.borrow(&mut tokens, &alice(), &cusdc(), dec!(151));
        assert_eq!(over, Err(MarketStatus::InsufficientLiquidity));
    }

    #[test]
    fn test_exit_refused_with_debt() {
        let (mut market, mut tokens) = setup();
        market.mint(&mut tokens, &alice(), &ceth(), dec!(1)).unwrap();
        market.enter_markets(&alice(), &[ceth()]);
        market.borrow(&mut tokens, &alice(), &cusdc(), dec!(100)).unwrap();

        let debt_market = market.exit_market(&tokens, &alice(), &cusdc());
        assert_eq!(debt_market, Err(MarketStatus::NonzeroBorrowBalance(cusdc())));

        let collateral = market.exit_market(&tokens, &alice(), &ceth());
        assert_eq!(collateral, Err(MarketStatus::InsufficientLiquidity));

        market.repay_borrow(&mut tokens, &alice(), &cusdc(), dec!(100)).unwrap();
        market.exit_market(&tokens, &alice(), &cusdc()).unwrap();
        market.exit_market(&tokens, &alice(), &ceth()).unwrap();
        assert!(!market.is_member(&alice(), &ceth()));
    }

    #[test]
    fn test_interest_lands_on_current_only() {
        let (mut market, mut tokens) = setup();
        market.mint(&mut tokens, &alice(), &ceth(), dec!(1)).unwrap();
        market.enter_markets(&alice(), &[ceth()]);
        market.borrow(&mut tokens, &alice(), &cusdc(), dec!(100)).unwrap();

        market.queue_interest(&alice(), &cusdc(), dec!(5));
        assert_eq!(market.borrow_balance_stored(&alice(), &cusdc()), dec!(100));
        assert_eq!(market.borrow_balance_current(&alice(), &cusdc()), dec!(105));
        assert_eq!(market.borrow_balance_stored(&alice(), &cusdc()), dec!(105));
    }

    #[test]
    fn test_enter_unlisted_market_fails() {
        let (mut market, _) = setup();
        let results = market.enter_markets(&alice(), &[AssetId::from("CDAI")]);
        assert!(matches!(results[0], Err(MarketStatus::MarketNotListed(_))));
    }

    #[test]
    fn test_redeem_underlying_burns_market_tokens() {
        let (mut market, mut tokens) = setup();
        market.mint(&mut tokens, &alice(), &ceth(), dec!(1)).unwrap();
        market
            .redeem_underlying(&mut tokens, &alice(), &ceth(), dec!(0.4))
            .unwrap();
        assert_eq!(tokens.balance_of(&ceth(), &alice()), dec!(0.6));
        assert_eq!(tokens.balance_of(&AssetId::from("ETH"), &alice()), dec!(0.4));
    }

    #[test]
    fn test_liquidation_seizes_collateral() {
        let (mut market, mut tokens) = setup();
        let keeper = AccountId::from("KEEPER");
        market.mint(&mut tokens, &alice(), &ceth(), dec!(1)).unwrap();
        market.enter_markets(&alice(), &[ceth()]);
        market.borrow(&mut tokens, &alice(), &cusdc(), dec!(600)).unwrap();
        tokens.mint(&AssetId::from("USDC"), &keeper, dec!(100)).unwrap();

        let seized = market
            .liquidate_borrow(&mut tokens, &keeper, &alice(), &cusdc(), dec!(100), &ceth())
            .unwrap();

        // 100 * 1 * 1.08 / 1000 = 0.108 CETH
        assert_eq!(seized, dec!(0.108));
        assert_eq!(market.borrow_balance_stored(&alice(), &cusdc()), dec!(500));
        assert_eq!(tokens.balance_of(&ceth(), &alice()), dec!(0.892));
    }
}
