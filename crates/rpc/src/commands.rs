//! CLI command handlers

use basket_bus::{EventLog, EventSubscriber};
use basket_core::{AccountId, AssetId, BasketId, ModuleId};
use basket_integrations::{MarketConfig, MockExchange, MockMoneyMarket, MockTradeAdapter};
use basket_kernel::ProtocolConfig;
use basket_ledger::{NewBasket, PositionKind};
use basket_leverage::{DeleverToZeroParams, LeverParams};
use chrono::Duration;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::context::MockContext;

/// Trade adapter name used by the demo
pub const DEMO_ADAPTER: &str = "MOCK_DEX";

/// Accounts and assets of the demo world
pub struct DemoWorld {
    pub basket: BasketId,
    pub manager: AccountId,
    pub investor: AccountId,
    pub eth: AssetId,
    pub usdc: AssetId,
    pub ceth: AssetId,
    pub cusdc: AssetId,
}

impl Default for DemoWorld {
    fn default() -> Self {
        Self {
            basket: BasketId::from("ETH2X"),
            manager: AccountId::from("MANAGER"),
            investor: AccountId::from("ALICE"),
            eth: AssetId::from("ETH"),
            usdc: AssetId::from("USDC"),
            ceth: AssetId::from("CETH"),
            cusdc: AssetId::from("CUSDC"),
        }
    }
}

/// Build a context with ETH and USDC markets, a 1000 USDC/ETH venue and an
/// ETH2X basket whose three modules are initialized.
pub fn setup_demo(config: ProtocolConfig) -> anyhow::Result<(MockContext, DemoWorld)> {
    let world = DemoWorld::default();
    let owner = config.owner.clone();
    let venue = AccountId::from("VENUE");

    let mut market = MockMoneyMarket::new();
    market.list_market(
        world.ceth.clone(),
        MarketConfig {
            underlying: world.eth.clone(),
            exchange_rate: Decimal::ONE,
            collateral_factor: Decimal::new(75, 2),
            price: Decimal::from(1000),
        },
    );
    market.list_market(
        world.cusdc.clone(),
        MarketConfig {
            underlying: world.usdc.clone(),
            exchange_rate: Decimal::ONE,
            collateral_factor: Decimal::new(8, 1),
            price: Decimal::ONE,
        },
    );

    let mut ctx = MockContext::new(config, market)?;

    // External liquidity: market reserves, venue inventory, investor collateral
    let tokens = &mut ctx.state_mut().core.tokens;
    tokens.mint(&world.eth, &world.ceth.reserve_account(), Decimal::from(10_000))?;
    tokens.mint(&world.usdc, &world.cusdc.reserve_account(), Decimal::from(10_000_000))?;
    tokens.mint(&world.eth, &venue, Decimal::from(10_000))?;
    tokens.mint(&world.usdc, &venue, Decimal::from(10_000_000))?;
    tokens.mint(&world.ceth, &world.investor, Decimal::from(100))?;

    let mut exchange = MockExchange::new(venue.clone());
    exchange.set_rate(world.usdc.clone(), world.eth.clone(), Decimal::new(1, 3));
    exchange.set_rate(world.eth.clone(), world.usdc.clone(), Decimal::from(1000));
    ctx.add_exchange(&owner, Box::new(exchange))?;

    let leverage = ctx.leverage_id().clone();
    let issuance = ctx.issuance_id().clone();
    let streaming_fee = ctx.streaming_fee_id().clone();
    ctx.add_integration(&owner, &leverage, Arc::new(MockTradeAdapter::new(DEMO_ADAPTER, venue)))?;

    ctx.add_money_market(&owner, &world.ceth, &world.eth)?;
    ctx.add_money_market(&owner, &world.cusdc, &world.usdc)?;

    ctx.create_basket(NewBasket {
        id: world.basket.clone(),
        manager: world.manager.clone(),
        components: vec![(world.ceth.clone(), Decimal::ONE)],
        modules: vec![issuance, leverage, streaming_fee],
    })?;
    ctx.update_allowed_basket(&owner, &world.basket, true)?;
    ctx.initialize_issuance(
        &world.manager,
        &world.basket,
        Decimal::new(1, 1),
        Decimal::ZERO,
        Decimal::ZERO,
        world.manager.clone(),
        None,
    )?;
    ctx.initialize_leverage(
        &world.manager,
        &world.basket,
        std::slice::from_ref(&world.eth),
        std::slice::from_ref(&world.usdc),
    )?;
    ctx.initialize_streaming_fee(
        &world.manager,
        &world.basket,
        world.manager.clone(),
        Decimal::new(1, 1),
        Decimal::new(2, 2),
    )?;

    Ok((ctx, world))
}

/// Walk a basket through issue → lever → fee accrual → interest sync →
/// delever to zero → redeem
pub async fn demo(config: ProtocolConfig) -> anyhow::Result<()> {
    let (mut ctx, world) = setup_demo(config)?;
    let log = Arc::new(EventLog::new("demo"));
    let subscriber = ctx.bus.spawn_subscriber(log.clone() as Arc<dyn EventSubscriber>);
    let basket = &world.basket;

    ctx.issue(&world.investor, basket, Decimal::from(10), &world.investor)?;
    println!("✅ Issued 10 {} to {}", basket, world.investor);
    print_positions(&ctx, basket)?;

    let supplied = ctx.lever(
        &world.manager,
        basket,
        &LeverParams {
            borrow_asset: world.usdc.clone(),
            collateral_asset: world.eth.clone(),
            borrow_quantity: Decimal::from(500),
            min_receive_quantity: Decimal::new(45, 2),
            adapter: DEMO_ADAPTER.to_string(),
            data: Vec::new(),
        },
    )?;
    println!("✅ Levered: supplied {} ETH as collateral", supplied);
    print_positions(&ctx, basket)?;

    ctx.advance_time(Duration::days(365));
    let (manager_fee, protocol_fee) = ctx.accrue_fee(basket)?;
    println!(
        "✅ Streaming fee after one year: manager {} / protocol {}",
        manager_fee, protocol_fee
    );
    print_positions(&ctx, basket)?;

    let account = basket.account();
    ctx.state_mut()
        .core
        .money_market
        .queue_interest(&account, &world.cusdc, Decimal::from(100));
    ctx.sync(basket, true)?;
    println!("✅ Synced after 100 USDC of interest");
    print_positions(&ctx, basket)?;

    let repaid = ctx.delever_to_zero_borrow_balance(
        &world.manager,
        basket,
        &DeleverToZeroParams {
            collateral_asset: world.eth.clone(),
            repay_asset: world.usdc.clone(),
            redeem_quantity: Decimal::new(55, 2),
            adapter: DEMO_ADAPTER.to_string(),
            data: Vec::new(),
        },
    )?;
    println!("✅ Repaid the whole borrow balance: {} USDC", repaid);
    print_positions(&ctx, basket)?;

    ctx.redeem(&world.investor, basket, Decimal::from(10), &world.investor)?;
    println!(
        "✅ Redeemed 10 {}: {} now holds {} CETH and {} USDC",
        basket,
        world.investor,
        ctx.balance_of(&world.ceth, &world.investor),
        ctx.balance_of(&world.usdc, &world.investor)
    );
    print_positions(&ctx, basket)?;

    // Closing the bus lets the subscriber drain and stop
    drop(ctx);
    subscriber.await?;
    println!("📜 {} events committed", log.events().len());
    for line in log.to_json_lines()? {
        println!("   {}", line);
    }
    Ok(())
}

/// Print the effective configuration
pub fn config(config: &ProtocolConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn print_positions(ctx: &MockContext, basket: &BasketId) -> anyhow::Result<()> {
    let state = ctx.basket(basket)?;
    println!(
        "   {} supply {} multiplier {}",
        basket,
        state.total_supply(),
        state.position_multiplier()
    );
    for position in ctx.positions(basket)? {
        let owner = position
            .module
            .as_ref()
            .map(ModuleId::to_string)
            .unwrap_or_else(|| "-".to_string());
        let kind = match position.kind {
            PositionKind::Default => "default",
            PositionKind::External => "external",
        };
        println!(
            "   {:<6} {:<9} {:<14} {}",
            position.component, kind, owner, position.unit
        );
    }
    Ok(())
}
