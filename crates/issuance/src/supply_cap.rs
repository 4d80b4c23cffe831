//! Manager hook that caps total basket supply

use basket_core::{AccountId, BasketId};
use basket_kernel::{Env, ManagerIssuanceHook, ModuleError};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyCapIssuanceHook {
    supply_cap: Decimal,
}

impl SupplyCapIssuanceHook {
    pub fn new(supply_cap: Decimal) -> Self {
        Self { supply_cap }
    }

    pub fn supply_cap(&self) -> Decimal {
        self.supply_cap
    }
}

impl ManagerIssuanceHook for SupplyCapIssuanceHook {
    fn name(&self) -> &str {
        "SUPPLY_CAP"
    }

    fn invoke_pre_issue_hook(
        &self,
        env: &Env<'_>,
        basket: &BasketId,
        quantity: Decimal,
        _issuer: &AccountId,
        _to: &AccountId,
    ) -> Result<(), ModuleError> {
        if env.total_supply(basket)? + quantity > self.supply_cap {
            return Err(ModuleError::SupplyCapExceeded);
        }
        Ok(())
    }
}
