//! Token book - fungible balances for every asset the protocol touches
//!
//! Basket tokens, underlying assets and money-market tokens all live here.
//! The book is deliberately minimal: balances, supplies, mint, burn and
//! transfer. Allowances are not modelled.

use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

use crate::id::{AccountId, AssetId};

/// Errors that can occur when moving balances
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient {asset} balance for {holder}: available {available}, required {required}")]
    InsufficientBalance {
        asset: AssetId,
        holder: AccountId,
        available: Decimal,
        required: Decimal,
    },

    #[error("Quantity cannot be negative: {0}")]
    NegativeQuantity(Decimal),
}

/// In-memory fungible token bookkeeping
#[derive(Debug, Clone, Default)]
pub struct TokenBook {
    balances: HashMap<AssetId, HashMap<AccountId, Decimal>>,
    supplies: HashMap<AssetId, Decimal>,
}

impl TokenBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `holder` in `asset` (zero if never touched)
    pub fn balance_of(&self, asset: &AssetId, holder: &AccountId) -> Decimal {
        self.balances
            .get(asset)
            .and_then(|holders| holders.get(holder))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Total minted supply of `asset`
    pub fn total_supply(&self, asset: &AssetId) -> Decimal {
        self.supplies.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// Create `quantity` new units of `asset` for `to`
    pub fn mint(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        quantity: Decimal,
    ) -> Result<(), TokenError> {
        check_quantity(quantity)?;
        *self.slot(asset, to) += quantity;
        *self.supplies.entry(asset.clone()).or_insert(Decimal::ZERO) += quantity;
        Ok(())
    }

    /// Destroy `quantity` units of `asset` held by `from`
    pub fn burn(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        quantity: Decimal,
    ) -> Result<(), TokenError> {
        check_quantity(quantity)?;
        self.debit(asset, from, quantity)?;
        *self.supplies.entry(asset.clone()).or_insert(Decimal::ZERO) -= quantity;
        Ok(())
    }

    /// Move `quantity` units of `asset` from `from` to `to`
    pub fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        quantity: Decimal,
    ) -> Result<(), TokenError> {
        check_quantity(quantity)?;
        self.debit(asset, from, quantity)?;
        *self.slot(asset, to) += quantity;
        Ok(())
    }

    fn debit(
        &mut self,
        asset: &AssetId,
        holder: &AccountId,
        quantity: Decimal,
    ) -> Result<(), TokenError> {
        let available = self.balance_of(asset, holder);
        if available < quantity {
            return Err(TokenError::InsufficientBalance {
                asset: asset.clone(),
                holder: holder.clone(),
                available,
                required: quantity,
            });
        }
        *self.slot(asset, holder) -= quantity;
        Ok(())
    }

    fn slot(&mut self, asset: &AssetId, holder: &AccountId) -> &mut Decimal {
        self.balances
            .entry(asset.clone())
            .or_default()
            .entry(holder.clone())
            .or_insert(Decimal::ZERO)
    }
}

fn check_quantity(quantity: Decimal) -> Result<(), TokenError> {
    if quantity < Decimal::ZERO {
        Err(TokenError::NegativeQuantity(quantity))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eth() -> AssetId {
        AssetId::from("ETH")
    }

    #[test]
    fn test_mint_and_supply() {
        let mut book = TokenBook::new();
        book.mint(&eth(), &AccountId::from("ALICE"), dec!(10)).unwrap();
        book.mint(&eth(), &AccountId::from("BOB"), dec!(5)).unwrap();

        assert_eq!(book.balance_of(&eth(), &AccountId::from("ALICE")), dec!(10));
        assert_eq!(book.total_supply(&eth()), dec!(15));
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut book = TokenBook::new();
        let alice = AccountId::from("ALICE");
        let bob = AccountId::from("BOB");
        book.mint(&eth(), &alice, dec!(10)).unwrap();

        book.transfer(&eth(), &alice, &bob, dec!(4)).unwrap();

        assert_eq!(book.balance_of(&eth(), &alice), dec!(6));
        assert_eq!(book.balance_of(&eth(), &bob), dec!(4));
        assert_eq!(book.total_supply(&eth()), dec!(10));
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut book = TokenBook::new();
        let alice = AccountId::from("ALICE");
        book.mint(&eth(), &alice, dec!(1)).unwrap();

        let result = book.transfer(&eth(), &alice, &AccountId::from("BOB"), dec!(2));
        assert!(matches!(result, Err(TokenError::InsufficientBalance { .. })));
        assert_eq!(book.balance_of(&eth(), &alice), dec!(1));
    }

    #[test]
    fn test_burn_reduces_supply() {
        let mut book = TokenBook::new();
        let alice = AccountId::from("ALICE");
        book.mint(&eth(), &alice, dec!(3)).unwrap();
        book.burn(&eth(), &alice, dec!(1)).unwrap();

        assert_eq!(book.total_supply(&eth()), dec!(2));
        assert!(book.burn(&eth(), &alice, dec!(5)).is_err());
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut book = TokenBook::new();
        let result = book.mint(&eth(), &AccountId::from("ALICE"), dec!(-1));
        assert_eq!(result, Err(TokenError::NegativeQuantity(dec!(-1))));
    }
}
