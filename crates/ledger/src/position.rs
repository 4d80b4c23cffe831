//! Positions - what one basket token is a claim on

use basket_core::precise::{precise_div, precise_mul, MathResult};
use basket_core::{AssetId, ModuleId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};

/// Lifecycle state of a module on a basket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleState {
    /// Added by the manager, waiting for the module to initialize itself
    Pending,
    /// Allowed to mutate the basket
    Initialized,
}

/// Whether a position is held in custody or attributed to a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionKind {
    Default,
    External,
}

/// Real-unit view of one position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub component: AssetId,
    /// Owning module for external positions
    pub module: Option<ModuleId>,
    /// Real unit per whole basket token; negative for debt
    pub unit: Decimal,
    pub kind: PositionKind,
    pub data: Vec<u8>,
}

/// A module-attributed position on one component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalPosition {
    pub virtual_unit: Decimal,
    pub data: Vec<u8>,
}

/// Everything the ledger stores for one component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentPosition {
    pub default_virtual_unit: Decimal,
    /// Modules with an external position, in the order they were attached
    pub external_modules: Vec<ModuleId>,
    pub external_positions: HashMap<ModuleId, ExternalPosition>,
}

impl ComponentPosition {
    pub fn has_external(&self) -> bool {
        !self.external_modules.is_empty()
    }

    pub fn external_virtual_unit(&self, module: &ModuleId) -> Decimal {
        self.external_positions
            .get(module)
            .map(|p| p.virtual_unit)
            .unwrap_or(Decimal::ZERO)
    }

    pub(crate) fn attach_module(&mut self, module: &ModuleId) {
        if !self.external_modules.contains(module) {
            self.external_modules.push(module.clone());
        }
    }

    pub(crate) fn detach_module(&mut self, module: &ModuleId) {
        self.external_modules.retain(|m| m != module);
        self.external_positions.remove(module);
    }
}

/// New default unit after a module moved tokens in or out of a basket.
///
/// Anything held above `pre_position_unit * supply` before the action is an
/// airdrop and is left out of the tracked unit. A holding below that amount
/// is not an airdrop, so the unit then follows the real balance.
pub fn calculate_default_edit_position_unit(
    supply: Decimal,
    pre_total_notional: Decimal,
    post_total_notional: Decimal,
    pre_position_unit: Decimal,
) -> MathResult {
    let airdropped =
        (pre_total_notional - precise_mul(pre_position_unit, supply)?).max(Decimal::ZERO);
    precise_div(post_total_notional - airdropped, supply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_edit_unit_without_airdrop() {
        // 10 tokens, 1 unit each, 100 notional spent
        let unit = calculate_default_edit_position_unit(dec!(10), dec!(10), dec!(110), dec!(1));
        assert_eq!(unit.unwrap(), dec!(11));
    }

    #[test]
    fn test_edit_unit_ignores_airdrop() {
        // 5 extra tokens were airdropped before the action
        let unit = calculate_default_edit_position_unit(dec!(10), dec!(15), dec!(25), dec!(1));
        assert_eq!(unit.unwrap(), dec!(2));
    }

    #[test]
    fn test_edit_unit_shortfall_does_not_inflate() {
        // Tracked 0.333333333333333334 * 3 = 1.000000000000000002, but only
        // 0.999999999999999999 is held
        let unit = calculate_default_edit_position_unit(
            dec!(3),
            dec!(0.999999999999999999),
            dec!(1.999999999999999999),
            dec!(0.333333333333333334),
        );
        assert_eq!(unit.unwrap(), dec!(0.666666666666666666));
    }

    #[test]
    fn test_edit_unit_zero_supply() {
        let unit = calculate_default_edit_position_unit(Decimal::ZERO, dec!(1), dec!(2), dec!(1));
        assert!(unit.is_err());
    }

    #[test]
    fn test_module_state_codes() {
        assert_eq!(ModuleState::Initialized.to_string(), "INITIALIZED");
        assert_eq!("PENDING".parse::<ModuleState>().unwrap(), ModuleState::Pending);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut position = ComponentPosition::default();
        let module = ModuleId::from("LEVERAGE");
        position.attach_module(&module);
        position.attach_module(&module);
        assert_eq!(position.external_modules.len(), 1);

        position.detach_module(&module);
        assert!(!position.has_external());
    }
}
