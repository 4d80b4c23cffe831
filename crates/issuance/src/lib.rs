//! Basket Debt Issuance
//!
//! Issues and redeems basket tokens against every position the basket
//! carries, equity and debt alike. Modules holding external positions are
//! called back through their issuance hooks, in registration order, while
//! the issuance module holds the basket lock.
//!
//! Rounding always favours the basket:
//!
//! | Flow | Rounding |
//! |---|---|
//! | issue, equity pulled from issuer | ceil |
//! | issue, debt paid out to issuer | floor |
//! | redeem, equity paid out to redeemer | floor |
//! | redeem, debt pulled from redeemer | ceil |

mod flows;
mod module;
mod supply_cap;

#[cfg(test)]
mod testing;

pub use flows::{ComponentFlow, FeeBreakdown};
pub use module::{DebtIssuanceModule, IssuanceSettings};
pub use supply_cap::SupplyCapIssuanceHook;

/// Index of the protocol's share of issue/redeem fees in the controller fee table
pub const PROTOCOL_FEE_SPLIT_INDEX: usize = 0;
