//! Module errors and their classification

use basket_core::{MathError, ModuleId, TokenError};
use basket_integrations::{IntegrationError, MarketStatus};
use basket_ledger::LedgerError;
use rust_decimal::Decimal;
use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;

/// Failure class of a reverted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Wrong caller or disabled module
    Authorization,
    /// Bad input or state, rejected before any external call
    Validation,
    /// Nonzero status from the money market or a failed venue call
    ExternalProtocol,
    /// Received less than the caller's minimum
    Slippage,
    /// Ledger, math or bookkeeping invariant
    Internal,
}

/// Every reason a module operation can revert
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    // === Authorization ===
    #[error("Ownable: caller is not the owner")]
    OnlyOwner,

    #[error("Must be the basket manager")]
    OnlyManager,

    #[error("Must be controller-enabled basket")]
    InvalidBasket,

    #[error("Must be a valid and initialized basket")]
    BasketNotInitialized,

    #[error("Must be a valid and pending basket")]
    BasketNotPending,

    #[error("Only the module can call")]
    OnlyModule,

    #[error("Module must be enabled on controller")]
    ModuleNotEnabled,

    #[error("Not allowed basket")]
    NotAllowedBasket,

    #[error("Issuance not initialized")]
    IssuanceNotInitialized,

    // === Validation: leverage ===
    #[error("Invalid basket")]
    InvalidBasketStatus,

    #[error("cToken must exist")]
    MarketMustExist,

    #[error("Already added")]
    MarketAlreadyAdded,

    #[error("Not added")]
    MarketNotAdded,

    #[error("Market in use")]
    MarketInUse,

    #[error("Collateral enabled")]
    CollateralEnabled,

    #[error("Borrow enabled")]
    BorrowEnabled,

    #[error("Collateral not enabled")]
    CollateralNotEnabled,

    #[error("Borrow not enabled")]
    BorrowNotEnabled,

    #[error("Collateral and borrow asset must be different")]
    SameAsset,

    #[error("Quantity is 0")]
    ZeroQuantity,

    #[error("Must be valid adapter")]
    InvalidAdapter,

    #[error("Component must be negative")]
    ComponentNotNegative,

    // === Validation: issuance ===
    #[error("Issue quantity must be > 0")]
    IssueQuantityZero,

    #[error("Redeem quantity must be > 0")]
    RedeemQuantityZero,

    #[error("Issue fee can't exceed maximum fee")]
    IssueFeeTooHigh,

    #[error("Redeem fee can't exceed maximum fee")]
    RedeemFeeTooHigh,

    #[error("Same fee recipient passed")]
    SameFeeRecipient,

    #[error("Issue fee passed is equal to existing fee")]
    SameIssueFee,

    #[error("Redeem fee passed is equal to existing fee")]
    SameRedeemFee,

    #[error("Registered modules must be removed.")]
    RegisteredModulesRemain,

    #[error("Module already registered.")]
    ModuleAlreadyRegistered,

    #[error("Module not registered.")]
    ModuleNotRegistered,

    #[error("Module hook not available: {0}")]
    HookUnavailable(ModuleId),

    #[error("Supply cap exceeded")]
    SupplyCapExceeded,

    // === Validation: streaming fee ===
    #[error("Max fee must be < 100%.")]
    MaxFeeTooHigh,

    #[error("Fee must be <= max.")]
    FeeAboveMax,

    #[error("Fee must be less than max")]
    FeeNotLessThanMax,

    // === Validation: controller ===
    #[error("Module already exists")]
    ModuleExists,

    #[error("Module does not exist")]
    ModuleMissing,

    #[error("Basket already exists")]
    BasketExists,

    #[error("Fee type already exists on module")]
    FeeTypeExists,

    #[error("Fee type does not exist on module")]
    FeeTypeMissing,

    #[error("Invalid fee percentage: {0}")]
    InvalidFeePercentage(Decimal),

    // === External protocol ===
    #[error("Mint failed")]
    MintFailed(#[source] MarketStatus),

    #[error("Borrow failed")]
    BorrowFailed(#[source] MarketStatus),

    #[error("Redeem failed")]
    RedeemFailed(#[source] MarketStatus),

    #[error("Repay failed")]
    RepayFailed(#[source] MarketStatus),

    #[error("Entering failed")]
    EnteringFailed(#[source] MarketStatus),

    #[error("Exiting failed")]
    ExitingFailed(#[source] MarketStatus),

    #[error("Trade failed: {0}")]
    TradeFailed(#[source] IntegrationError),

    // === Slippage ===
    #[error("Slippage too high")]
    SlippageTooHigh { received: Decimal, minimum: Decimal },

    // === Internal ===
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Math(#[from] MathError),
}

impl ModuleError {
    /// Classify the failure
    pub fn kind(&self) -> ErrorKind {
        use ModuleError::*;
        match self {
            OnlyOwner | OnlyManager | InvalidBasket | BasketNotInitialized | BasketNotPending | OnlyModule
            | ModuleNotEnabled | NotAllowedBasket | IssuanceNotInitialized => {
                ErrorKind::Authorization
            }

            MintFailed(_) | BorrowFailed(_) | RedeemFailed(_) | RepayFailed(_)
            | EnteringFailed(_) | ExitingFailed(_) | TradeFailed(_) => ErrorKind::ExternalProtocol,

            SlippageTooHigh { .. } => ErrorKind::Slippage,

            // Wrong module acting on a basket is an authorization failure
            Ledger(LedgerError::ModuleNotInitialized(_))
            | Ledger(LedgerError::LockedByOther { .. })
            | Ledger(LedgerError::HookNotOwned { .. })
            | Ledger(LedgerError::Locked { .. }) => ErrorKind::Authorization,

            Ledger(_) | Token(_) | Math(_) | HookUnavailable(_) => ErrorKind::Internal,

            _ => ErrorKind::Validation,
        }
    }

    /// Fixed reason string of the failure
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
