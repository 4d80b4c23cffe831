//! Leverage module: market registry, basket allow-list, enablement and lifecycle

use basket_bus::ProtocolEvent;
use basket_core::{AccountId, AssetId, BasketId, ModuleId};
use basket_kernel::{Env, IssuanceRegistrar, ModuleError};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::state::EnabledAssets;

/// The leverage engine
#[derive(Debug, Clone)]
pub struct LeverageModule {
    pub(crate) id: ModuleId,
    pub(crate) issuance_module: ModuleId,
    /// underlying -> market token
    pub(crate) underlying_to_market: HashMap<AssetId, AssetId>,
    /// market token -> underlying
    pub(crate) market_to_underlying: HashMap<AssetId, AssetId>,
    pub(crate) enabled: HashMap<BasketId, EnabledAssets>,
    allowed_baskets: HashSet<BasketId>,
    any_basket_allowed: bool,
}

impl LeverageModule {
    pub fn new(id: ModuleId, issuance_module: ModuleId) -> Self {
        Self {
            id,
            issuance_module,
            underlying_to_market: HashMap::new(),
            market_to_underlying: HashMap::new(),
            enabled: HashMap::new(),
            allowed_baskets: HashSet::new(),
            any_basket_allowed: false,
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn issuance_module(&self) -> &ModuleId {
        &self.issuance_module
    }

    pub fn market_for(&self, underlying: &AssetId) -> Option<&AssetId> {
        self.underlying_to_market.get(underlying)
    }

    pub fn enabled_assets(&self, basket: &BasketId) -> EnabledAssets {
        self.enabled.get(basket).cloned().unwrap_or_default()
    }

    pub fn is_allowed_basket(&self, basket: &BasketId) -> bool {
        self.allowed_baskets.contains(basket)
    }

    pub fn any_basket_allowed(&self) -> bool {
        self.any_basket_allowed
    }

    pub(crate) fn underlying_of(&self, market: &AssetId) -> Result<&AssetId, ModuleError> {
        self.market_to_underlying
            .get(market)
            .ok_or(ModuleError::MarketNotAdded)
    }

    // === Owner: protocol-wide registry ===

    /// Map `underlying` to its money-market token
    pub fn add_money_market(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        market: &AssetId,
        underlying: &AssetId,
    ) -> Result<(), ModuleError> {
        env.controller.only_owner(caller)?;
        if self.underlying_to_market.contains_key(underlying) {
            return Err(ModuleError::MarketAlreadyAdded);
        }
        if env.money_market.underlying(market).as_ref() != Some(underlying) {
            return Err(ModuleError::MarketMustExist);
        }

        self.underlying_to_market
            .insert(underlying.clone(), market.clone());
        self.market_to_underlying
            .insert(market.clone(), underlying.clone());
        env.emit(ProtocolEvent::MoneyMarketAdded {
            market: market.clone(),
            underlying: underlying.clone(),
        });
        Ok(())
    }

    /// Drop the mapping for `underlying`; refused while any basket still uses it
    pub fn remove_money_market(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        underlying: &AssetId,
    ) -> Result<(), ModuleError> {
        env.controller.only_owner(caller)?;
        let market = self
            .underlying_to_market
            .get(underlying)
            .cloned()
            .ok_or(ModuleError::MarketNotAdded)?;
        if self.enabled.values().any(|assets| assets.uses(&market)) {
            return Err(ModuleError::MarketInUse);
        }

        self.underlying_to_market.remove(underlying);
        self.market_to_underlying.remove(&market);
        env.emit(ProtocolEvent::MoneyMarketRemoved {
            market,
            underlying: underlying.clone(),
        });
        Ok(())
    }

    pub fn update_allowed_basket(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        allowed: bool,
    ) -> Result<(), ModuleError> {
        env.controller.only_owner(caller)?;
        if !env.controller.is_basket(basket) && !self.allowed_baskets.contains(basket) {
            return Err(ModuleError::InvalidBasketStatus);
        }

        if allowed {
            self.allowed_baskets.insert(basket.clone());
        } else {
            self.allowed_baskets.remove(basket);
        }
        env.emit(ProtocolEvent::BasketStatusUpdated {
            basket: basket.clone(),
            added: allowed,
        });
        Ok(())
    }

    pub fn update_any_basket_allowed(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        any_basket_allowed: bool,
    ) -> Result<(), ModuleError> {
        env.controller.only_owner(caller)?;
        self.any_basket_allowed = any_basket_allowed;
        env.emit(ProtocolEvent::AnyBasketAllowedUpdated { any_basket_allowed });
        Ok(())
    }

    // === Manager: lifecycle ===

    /// Initialize on a basket, register with issuance and enable assets
    pub fn initialize(
        &mut self,
        env: &mut Env<'_>,
        registrar: &mut dyn IssuanceRegistrar,
        caller: &AccountId,
        basket: &BasketId,
        collateral_assets: &[AssetId],
        borrow_assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        env.only_manager(basket, caller)?;
        env.only_valid_and_pending(basket, &self.id)?;
        if !self.any_basket_allowed && !self.allowed_baskets.contains(basket) {
            return Err(ModuleError::NotAllowedBasket);
        }

        env.ledger.initialize_module(basket, &self.id)?;
        env.emit(ProtocolEvent::ModuleInitialized {
            basket: basket.clone(),
            module: self.id.clone(),
        });

        if registrar.issuance_module_id() != &self.issuance_module
            || !env.basket(basket)?.is_initialized_module(&self.issuance_module)
        {
            return Err(ModuleError::IssuanceNotInitialized);
        }
        registrar.register(env, &self.id, basket)?;

        self.enabled.entry(basket.clone()).or_default();
        self.enable_collateral(env, basket, collateral_assets)?;
        self.enable_borrow(env, basket, borrow_assets)?;

        info!(basket = %basket, module = %self.id, "Leverage module initialized");
        Ok(())
    }

    /// Tear down: sync with accrual, exit every market, unregister from issuance.
    ///
    /// Fails while debt is outstanding because the money market refuses to
    /// release membership.
    pub fn remove_module(
        &mut self,
        env: &mut Env<'_>,
        registrar: &mut dyn IssuanceRegistrar,
        basket: &BasketId,
    ) -> Result<(), ModuleError> {
        env.only_valid_and_initialized(basket, &self.id)?;
        self.sync_positions(env, basket, true)?;

        let enabled = self.enabled_assets(basket);
        let account = basket.account();
        for market in &enabled.borrow_markets {
            if !enabled.is_collateral(market) {
                env.money_market
                    .exit_market(env.tokens, &account, market)
                    .map_err(ModuleError::ExitingFailed)?;
            }
        }
        for market in &enabled.collateral_markets {
            env.money_market
                .exit_market(env.tokens, &account, market)
                .map_err(ModuleError::ExitingFailed)?;
        }
        self.enabled.remove(basket);

        if registrar.issuance_module_id() == &self.issuance_module {
            if let Err(e) = registrar.unregister(env, &self.id, basket) {
                debug!(basket = %basket, error = %e, "Issuance unregister skipped");
            }
        }

        info!(basket = %basket, module = %self.id, "Leverage module removed");
        Ok(())
    }

    /// Re-register after the issuance module was re-initialized
    pub fn register_to_issuance_module(
        &mut self,
        env: &mut Env<'_>,
        registrar: &mut dyn IssuanceRegistrar,
        caller: &AccountId,
        basket: &BasketId,
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        if registrar.issuance_module_id() != &self.issuance_module
            || !env.basket(basket)?.is_initialized_module(&self.issuance_module)
        {
            return Err(ModuleError::IssuanceNotInitialized);
        }
        registrar.register(env, &self.id, basket)
    }

    // === Manager: enablement ===

    pub fn add_collateral_assets(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        self.enable_collateral(env, basket, assets)
    }

    pub fn add_borrow_assets(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        self.enable_borrow(env, basket, assets)
    }

    pub fn remove_collateral_assets(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        let account = basket.account();
        for asset in assets {
            let market = self.market_for(asset).cloned();
            let enabled = self.enabled.entry(basket.clone()).or_default();
            let market = match market {
                Some(m) if enabled.is_collateral(&m) => m,
                _ => return Err(ModuleError::CollateralNotEnabled),
            };
            if !enabled.is_borrow(&market) {
                env.money_market
                    .exit_market(env.tokens, &account, &market)
                    .map_err(ModuleError::ExitingFailed)?;
            }
            enabled.collateral_markets.retain(|m| m != &market);
        }

        env.emit(ProtocolEvent::CollateralAssetsUpdated {
            basket: basket.clone(),
            added: false,
            assets: assets.to_vec(),
        });
        Ok(())
    }

    pub fn remove_borrow_assets(
        &mut self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        let account = basket.account();
        for asset in assets {
            let market = self.market_for(asset).cloned();
            let enabled = self.enabled.entry(basket.clone()).or_default();
            let market = match market {
                Some(m) if enabled.is_borrow(&m) => m,
                _ => return Err(ModuleError::BorrowNotEnabled),
            };
            if !enabled.is_collateral(&market) {
                env.money_market
                    .exit_market(env.tokens, &account, &market)
                    .map_err(ModuleError::ExitingFailed)?;
            }
            enabled.borrow_markets.retain(|m| m != &market);
        }

        env.emit(ProtocolEvent::BorrowAssetsUpdated {
            basket: basket.clone(),
            added: false,
            assets: assets.to_vec(),
        });
        Ok(())
    }

    fn enable_collateral(
        &mut self,
        env: &mut Env<'_>,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        let account = basket.account();
        for asset in assets {
            let market = self
                .market_for(asset)
                .cloned()
                .ok_or(ModuleError::MarketMustExist)?;
            let enabled = self.enabled.entry(basket.clone()).or_default();
            if enabled.is_collateral(&market) {
                return Err(ModuleError::CollateralEnabled);
            }
            // Already a member if enabled for borrowing
            if !enabled.is_borrow(&market) {
                enter_market(env, &account, &market)?;
            }
            enabled.collateral_markets.push(market);
        }

        env.emit(ProtocolEvent::CollateralAssetsUpdated {
            basket: basket.clone(),
            added: true,
            assets: assets.to_vec(),
        });
        Ok(())
    }

    fn enable_borrow(
        &mut self,
        env: &mut Env<'_>,
        basket: &BasketId,
        assets: &[AssetId],
    ) -> Result<(), ModuleError> {
        let account = basket.account();
        for asset in assets {
            let market = self
                .market_for(asset)
                .cloned()
                .ok_or(ModuleError::MarketMustExist)?;
            let enabled = self.enabled.entry(basket.clone()).or_default();
            if enabled.is_borrow(&market) {
                return Err(ModuleError::BorrowEnabled);
            }
            if !enabled.is_collateral(&market) {
                enter_market(env, &account, &market)?;
            }
            enabled.borrow_markets.push(market);
        }

        env.emit(ProtocolEvent::BorrowAssetsUpdated {
            basket: basket.clone(),
            added: true,
            assets: assets.to_vec(),
        });
        Ok(())
    }
}

fn enter_market(env: &mut Env<'_>, account: &AccountId, market: &AssetId) -> Result<(), ModuleError> {
    let results = env
        .money_market
        .enter_markets(account, std::slice::from_ref(market));
    for result in results {
        result.map_err(ModuleError::EnteringFailed)?;
    }
    Ok(())
}
