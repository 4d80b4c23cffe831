//! Lever, delever and sync

use basket_bus::ProtocolEvent;
use basket_core::precise::{precise_div, precise_div_ceil, precise_mul, precise_mul_ceil};
use basket_core::{AccountId, AssetId, BasketId};
use basket_kernel::{Env, ModuleError};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::module::LeverageModule;
use crate::state::{ActionInfo, DeleverParams, DeleverToZeroParams, LeverParams};
use crate::PROTOCOL_TRADE_FEE_INDEX;

impl LeverageModule {
    /// Borrow, trade the borrowed asset into collateral, supply the collateral.
    ///
    /// Returns the collateral quantity supplied after the protocol fee.
    pub fn lever(
        &self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        params: &LeverParams,
    ) -> Result<Decimal, ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        env.guarded(basket, &self.id, |env| {
            let info = self.create_action_info(
                env,
                basket,
                &params.collateral_asset,
                &params.borrow_asset,
                &params.adapter,
                params.borrow_quantity,
                params.min_receive_quantity,
                &params.collateral_asset,
            )?;

            self.borrow(env, basket, &info.borrow_market, info.notional_send)?;
            let received = self.execute_trade(
                env,
                &info,
                &params.borrow_asset,
                &params.collateral_asset,
                &params.data,
            )?;
            let protocol_fee = self.accrue_protocol_fee(env, basket, &params.collateral_asset, received)?;
            let supplied = received - protocol_fee;
            self.mint_market_token(env, basket, &info.collateral_market, supplied)?;
            self.update_lever_positions(env, &info, &params.borrow_asset)?;

            env.emit(ProtocolEvent::LeverageIncreased {
                basket: basket.clone(),
                borrow_asset: params.borrow_asset.clone(),
                collateral_asset: params.collateral_asset.clone(),
                exchange_adapter: info.adapter_name.clone(),
                total_borrow_amount: info.notional_send,
                total_received_amount: received,
                protocol_fee,
            });
            info!(
                basket = %basket,
                borrowed = %info.notional_send,
                received = %received,
                protocol_fee = %protocol_fee,
                "Leverage increased"
            );
            Ok(supplied)
        })
    }

    /// Redeem collateral, trade it into the borrowed asset, repay.
    ///
    /// Returns the quantity repaid.
    pub fn delever(
        &self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        params: &DeleverParams,
    ) -> Result<Decimal, ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        env.guarded(basket, &self.id, |env| {
            let info = self.create_action_info(
                env,
                basket,
                &params.collateral_asset,
                &params.repay_asset,
                &params.adapter,
                params.redeem_quantity,
                params.min_repay_quantity,
                &params.repay_asset,
            )?;

            self.redeem_underlying(env, basket, &info.collateral_market, info.notional_send)?;
            let received = self.execute_trade(
                env,
                &info,
                &params.collateral_asset,
                &params.repay_asset,
                &params.data,
            )?;
            let protocol_fee = self.accrue_protocol_fee(env, basket, &params.repay_asset, received)?;
            let repaid = received - protocol_fee;
            self.repay_borrow(env, basket, &info.borrow_market, repaid)?;
            self.update_lever_positions(env, &info, &params.repay_asset)?;

            env.emit(ProtocolEvent::LeverageDecreased {
                basket: basket.clone(),
                collateral_asset: params.collateral_asset.clone(),
                repay_asset: params.repay_asset.clone(),
                exchange_adapter: info.adapter_name.clone(),
                total_redeem_amount: info.notional_send,
                total_repay_amount: received,
                protocol_fee,
            });
            info!(
                basket = %basket,
                redeemed = %info.notional_send,
                repaid = %repaid,
                protocol_fee = %protocol_fee,
                "Leverage decreased"
            );
            Ok(repaid)
        })
    }

    /// Repay the whole current borrow balance of `repay_asset`.
    ///
    /// Anything the trade returns above the debt becomes a default position in
    /// the repay asset. No protocol fee is charged. Returns the quantity repaid.
    pub fn delever_to_zero_borrow_balance(
        &self,
        env: &mut Env<'_>,
        caller: &AccountId,
        basket: &BasketId,
        params: &DeleverToZeroParams,
    ) -> Result<Decimal, ModuleError> {
        env.only_manager_and_valid(basket, caller, &self.id)?;
        let enabled = self.enabled_assets(basket);
        let borrow_market = self
            .market_for(&params.repay_asset)
            .filter(|m| enabled.is_borrow(m))
            .cloned()
            .ok_or(ModuleError::BorrowNotEnabled)?;

        env.guarded(basket, &self.id, |env| {
            let supply = env.total_supply(basket)?;
            let notional_repay = env
                .money_market
                .borrow_balance_current(&basket.account(), &borrow_market);

            let info = self.create_action_info_notional(
                env,
                basket,
                &params.collateral_asset,
                &params.repay_asset,
                &params.adapter,
                precise_mul(params.redeem_quantity, supply)?,
                notional_repay,
                &params.repay_asset,
                supply,
            )?;

            self.redeem_underlying(env, basket, &info.collateral_market, info.notional_send)?;
            self.execute_trade(
                env,
                &info,
                &params.collateral_asset,
                &params.repay_asset,
                &params.data,
            )?;
            self.repay_borrow(env, basket, &info.borrow_market, notional_repay)?;

            env.calculate_and_edit_default_position(
                basket,
                &self.id,
                &params.repay_asset,
                supply,
                info.pre_trade_receive_balance,
            )?;
            self.update_lever_positions(env, &info, &params.repay_asset)?;

            env.emit(ProtocolEvent::LeverageDecreased {
                basket: basket.clone(),
                collateral_asset: params.collateral_asset.clone(),
                repay_asset: params.repay_asset.clone(),
                exchange_adapter: info.adapter_name.clone(),
                total_redeem_amount: info.notional_send,
                total_repay_amount: notional_repay,
                protocol_fee: Decimal::ZERO,
            });
            info!(basket = %basket, repaid = %notional_repay, "Borrow balance repaid in full");
            Ok(notional_repay)
        })
    }

    /// Reconcile collateral and debt units with the money market.
    ///
    /// With `accrue_interest` the borrow balance is accrued before it is read.
    pub fn sync(
        &self,
        env: &mut Env<'_>,
        basket: &BasketId,
        accrue_interest: bool,
    ) -> Result<(), ModuleError> {
        env.only_valid_and_initialized(basket, &self.id)?;
        env.guarded(basket, &self.id, |env| {
            self.sync_positions(env, basket, accrue_interest)
        })
    }

    /// Sync without taking the lock; the caller must already be entitled to write
    pub(crate) fn sync_positions(
        &self,
        env: &mut Env<'_>,
        basket: &BasketId,
        accrue_interest: bool,
    ) -> Result<(), ModuleError> {
        let supply = env.total_supply(basket)?;
        // Zero supply keeps the last units so issuance can restore them
        if supply.is_zero() {
            return Ok(());
        }
        let enabled = self.enabled_assets(basket);

        for market in &enabled.collateral_markets {
            let previous = env.basket(basket)?.default_position_real_unit(market)?;
            let current = precise_div(env.balance_of(basket, market), supply)?;
            if previous != current {
                env.ledger
                    .edit_default_position_unit(basket, &self.id, market, current)?;
            }
        }

        for market in &enabled.borrow_markets {
            let underlying = self.underlying_of(market)?.clone();
            let previous = env
                .basket(basket)?
                .external_position_real_unit(&underlying, &self.id)?;
            let current = self.borrow_position_unit(env, basket, market, supply, accrue_interest)?;
            if previous != current {
                env.ledger.edit_external_position_unit(
                    basket,
                    &self.id,
                    &underlying,
                    &self.id,
                    current,
                    Vec::new(),
                )?;
            }
        }

        debug!(basket = %basket, accrue_interest, "Positions synced");
        Ok(())
    }

    // === Action setup ===

    #[allow(clippy::too_many_arguments)]
    fn create_action_info(
        &self,
        env: &Env<'_>,
        basket: &BasketId,
        collateral_asset: &AssetId,
        borrow_asset: &AssetId,
        adapter: &str,
        send_units: Decimal,
        min_receive_units: Decimal,
        receive_asset: &AssetId,
    ) -> Result<ActionInfo, ModuleError> {
        let supply = env.total_supply(basket)?;
        self.create_action_info_notional(
            env,
            basket,
            collateral_asset,
            borrow_asset,
            adapter,
            precise_mul(send_units, supply)?,
            precise_mul_ceil(min_receive_units, supply)?,
            receive_asset,
            supply,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn create_action_info_notional(
        &self,
        env: &Env<'_>,
        basket: &BasketId,
        collateral_asset: &AssetId,
        borrow_asset: &AssetId,
        adapter: &str,
        notional_send: Decimal,
        min_notional_receive: Decimal,
        receive_asset: &AssetId,
        supply: Decimal,
    ) -> Result<ActionInfo, ModuleError> {
        let enabled = self.enabled_assets(basket);
        let collateral_market = self
            .market_for(collateral_asset)
            .filter(|m| enabled.is_collateral(m))
            .cloned()
            .ok_or(ModuleError::CollateralNotEnabled)?;
        let borrow_market = self
            .market_for(borrow_asset)
            .filter(|m| enabled.is_borrow(m))
            .cloned()
            .ok_or(ModuleError::BorrowNotEnabled)?;
        if collateral_market == borrow_market {
            return Err(ModuleError::SameAsset);
        }
        if notional_send <= Decimal::ZERO {
            return Err(ModuleError::ZeroQuantity);
        }

        let adapter_handle = env
            .integrations
            .get_integration_adapter(&self.id, adapter)
            .map_err(|_| ModuleError::InvalidAdapter)?;

        Ok(ActionInfo {
            basket: basket.clone(),
            adapter_name: adapter.to_string(),
            adapter: adapter_handle,
            supply,
            notional_send,
            min_notional_receive,
            pre_trade_receive_balance: env.balance_of(basket, receive_asset),
            collateral_market,
            borrow_market,
        })
    }

    // === Trade ===

    /// Execute the adapter's call and measure what actually arrived
    fn execute_trade(
        &self,
        env: &mut Env<'_>,
        info: &ActionInfo,
        send_asset: &AssetId,
        receive_asset: &AssetId,
        data: &[u8],
    ) -> Result<Decimal, ModuleError> {
        let call = info
            .adapter
            .get_trade_calldata(
                send_asset,
                receive_asset,
                &info.basket.account(),
                info.notional_send,
                info.min_notional_receive,
                data,
            )
            .map_err(ModuleError::TradeFailed)?;
        env.invoke_exchange(&info.basket, &self.id, &call)?;

        let received = env.balance_of(&info.basket, receive_asset) - info.pre_trade_receive_balance;
        if received < info.min_notional_receive {
            return Err(ModuleError::SlippageTooHigh {
                received,
                minimum: info.min_notional_receive,
            });
        }
        debug!(basket = %info.basket, received = %received, "Trade executed");
        Ok(received)
    }

    /// Pay the protocol trade fee out of `received`; returns the fee
    fn accrue_protocol_fee(
        &self,
        env: &mut Env<'_>,
        basket: &BasketId,
        asset: &AssetId,
        received: Decimal,
    ) -> Result<Decimal, ModuleError> {
        let rate = env.controller.module_fee(&self.id, PROTOCOL_TRADE_FEE_INDEX);
        let fee = precise_mul(received, rate)?;
        let recipient = env.controller.fee_recipient().clone();
        env.invoke_transfer(basket, &self.id, asset, &recipient, fee)?;
        Ok(fee)
    }

    // === Money market calls on behalf of the basket ===

    pub(crate) fn borrow(
        &self,
        env: &mut Env<'_>,
        basket: &BasketId,
        market: &AssetId,
        quantity: Decimal,
    ) -> Result<(), ModuleError> {
        env.ensure_module(basket, &self.id)?;
        env.money_market
            .borrow(env.tokens, &basket.account(), market, quantity)
            .map_err(ModuleError::BorrowFailed)
    }

    pub(crate) fn repay_borrow(
        &self,
        env: &mut Env<'_>,
        basket: &BasketId,
        market: &AssetId,
        quantity: Decimal,
    ) -> Result<(), ModuleError> {
        env.ensure_module(basket, &self.id)?;
        env.money_market
            .repay_borrow(env.tokens, &basket.account(), market, quantity)
            .map_err(ModuleError::RepayFailed)
    }

    fn mint_market_token(
        &self,
        env: &mut Env<'_>,
        basket: &BasketId,
        market: &AssetId,
        quantity: Decimal,
    ) -> Result<Decimal, ModuleError> {
        env.ensure_module(basket, &self.id)?;
        env.money_market
            .mint(env.tokens, &basket.account(), market, quantity)
            .map_err(ModuleError::MintFailed)
    }

    fn redeem_underlying(
        &self,
        env: &mut Env<'_>,
        basket: &BasketId,
        market: &AssetId,
        quantity: Decimal,
    ) -> Result<(), ModuleError> {
        env.ensure_module(basket, &self.id)?;
        env.money_market
            .redeem_underlying(env.tokens, &basket.account(), market, quantity)
            .map_err(ModuleError::RedeemFailed)
    }

    // === Position updates ===

    fn update_lever_positions(
        &self,
        env: &mut Env<'_>,
        info: &ActionInfo,
        borrow_asset: &AssetId,
    ) -> Result<(), ModuleError> {
        let collateral_unit =
            precise_div(env.balance_of(&info.basket, &info.collateral_market), info.supply)?;
        env.ledger.edit_default_position_unit(
            &info.basket,
            &self.id,
            &info.collateral_market,
            collateral_unit,
        )?;

        let debt_unit =
            self.borrow_position_unit(env, &info.basket, &info.borrow_market, info.supply, false)?;
        env.ledger.edit_external_position_unit(
            &info.basket,
            &self.id,
            borrow_asset,
            &self.id,
            debt_unit,
            Vec::new(),
        )?;
        Ok(())
    }

    /// `-(borrow balance / supply)`, rounded away from zero
    fn borrow_position_unit(
        &self,
        env: &mut Env<'_>,
        basket: &BasketId,
        market: &AssetId,
        supply: Decimal,
        accrue_interest: bool,
    ) -> Result<Decimal, ModuleError> {
        let account = basket.account();
        let balance = if accrue_interest {
            env.money_market.borrow_balance_current(&account, market)
        } else {
            env.money_market.borrow_balance_stored(&account, market)
        };
        Ok(Decimal::ZERO - precise_div_ceil(balance, supply)?)
    }
}
