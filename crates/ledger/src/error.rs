//! Ledger errors

use basket_core::{AssetId, BasketId, MathError, ModuleId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Basket not found: {0}")]
    BasketNotFound(BasketId),

    #[error("Basket already exists: {0}")]
    BasketExists(BasketId),

    // === Creation ===
    #[error("Must have at least 1 component")]
    NoComponents,

    #[error("Must have at least 1 module")]
    NoModules,

    #[error("Components must not have a duplicate: {0}")]
    DuplicateComponent(AssetId),

    #[error("Units must be greater than 0: {0}")]
    NonPositiveUnit(AssetId),

    // === Module lifecycle ===
    #[error("Module must not be added: {0}")]
    ModuleAlreadyAdded(ModuleId),

    #[error("Module must be pending: {0}")]
    ModuleNotPending(ModuleId),

    #[error("Module must be added: {0}")]
    ModuleNotAdded(ModuleId),

    #[error("Only the module can call")]
    ModuleNotInitialized(ModuleId),

    // === In-progress guard ===
    #[error("Must not be locked (locked by {locker})")]
    Locked { locker: ModuleId },

    #[error("Must be locked")]
    NotLocked,

    #[error("Locker only can unlock")]
    NotLocker,

    #[error("When locked, only the locker can call (locker {locker}, caller {caller})")]
    LockedByOther { locker: ModuleId, caller: ModuleId },

    #[error("Only the active module can enter a hook (active {active}, caller {caller})")]
    HookNotOwned { active: ModuleId, caller: ModuleId },

    // === Positions ===
    #[error("Default position unit must not be negative: {0}")]
    NegativeDefaultUnit(Decimal),

    #[error("Passed data must be null")]
    PassedDataMustBeNull,

    #[error("External positions must be 0 to remove component")]
    ExternalPositionsMustBeZero,

    #[error("New multiplier too small")]
    MultiplierTooSmall,

    #[error("Real to Virtual unit conversion invalid")]
    RealToVirtualInvalid,

    #[error("Virtual to Real unit conversion invalid")]
    VirtualToRealInvalid,

    // === Supply ===
    #[error("Supply must be positive: old {old}, new {new}")]
    InvalidSupply { old: Decimal, new: Decimal },

    #[error("Burn exceeds total supply: supply {supply}, burn {burn}")]
    InsufficientSupply { supply: Decimal, burn: Decimal },

    #[error(transparent)]
    Math(#[from] MathError),
}
