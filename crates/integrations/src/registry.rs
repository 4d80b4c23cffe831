//! Integration registry - adapter lookup by module and name

use basket_core::ModuleId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::IntegrationError;
use crate::trade::TradeAdapter;

/// Maps `(module, adapter name)` to a trade adapter
#[derive(Debug, Clone, Default)]
pub struct IntegrationRegistry {
    adapters: HashMap<(ModuleId, String), Arc<dyn TradeAdapter>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_integration(
        &mut self,
        module: &ModuleId,
        adapter: Arc<dyn TradeAdapter>,
    ) -> Result<(), IntegrationError> {
        let key = (module.clone(), adapter.name().to_string());
        if self.adapters.contains_key(&key) {
            return Err(IntegrationError::AdapterExists {
                module: key.0,
                name: key.1,
            });
        }
        debug!(module = %module, adapter = adapter.name(), "Integration added");
        self.adapters.insert(key, adapter);
        Ok(())
    }

    pub fn remove_integration(
        &mut self,
        module: &ModuleId,
        name: &str,
    ) -> Result<(), IntegrationError> {
        self.adapters
            .remove(&(module.clone(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| IntegrationError::AdapterNotFound {
                module: module.clone(),
                name: name.to_string(),
            })
    }

    /// Resolve an adapter; unknown names fail with "Must be valid adapter"
    pub fn get_integration_adapter(
        &self,
        module: &ModuleId,
        name: &str,
    ) -> Result<Arc<dyn TradeAdapter>, IntegrationError> {
        self.adapters
            .get(&(module.clone(), name.to_string()))
            .cloned()
            .ok_or_else(|| IntegrationError::AdapterNotFound {
                module: module.clone(),
                name: name.to_string(),
            })
    }

    pub fn is_valid_integration(&self, module: &ModuleId, name: &str) -> bool {
        self.adapters.contains_key(&(module.clone(), name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTradeAdapter;
    use basket_core::AccountId;

    #[test]
    fn test_resolve_by_module_and_name() {
        let mut registry = IntegrationRegistry::new();
        let leverage = ModuleId::from("LEVERAGE");
        let adapter = Arc::new(MockTradeAdapter::new("MOCK_DEX", AccountId::from("DEX")));
        registry.add_integration(&leverage, adapter).unwrap();

        assert!(registry.is_valid_integration(&leverage, "MOCK_DEX"));
        assert_eq!(
            registry.get_integration_adapter(&leverage, "MOCK_DEX").unwrap().name(),
            "MOCK_DEX"
        );

        let other = ModuleId::from("ISSUANCE");
        let missing = registry.get_integration_adapter(&other, "MOCK_DEX");
        assert!(matches!(missing, Err(IntegrationError::AdapterNotFound { .. })));
    }

    #[test]
    fn test_duplicate_and_remove() {
        let mut registry = IntegrationRegistry::new();
        let leverage = ModuleId::from("LEVERAGE");
        let adapter = Arc::new(MockTradeAdapter::new("MOCK_DEX", AccountId::from("DEX")));
        registry.add_integration(&leverage, adapter.clone()).unwrap();
        assert!(registry.add_integration(&leverage, adapter).is_err());

        registry.remove_integration(&leverage, "MOCK_DEX").unwrap();
        assert!(registry.remove_integration(&leverage, "MOCK_DEX").is_err());
    }
}
