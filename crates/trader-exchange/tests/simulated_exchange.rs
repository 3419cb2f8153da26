//! Integration tests for the simulated exchange over a shared data cursor.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::{
    IdGenerator, Item, OrderBook, OrderStatus, OrderType, PlaceOrderOptions, Side,
    SimulatedExchangeConfig,
};
use trader_data::{DataCursor, MemoryLoader, SharedCursor};
use trader_exchange::{
    EventLog, Exchange, ExchangeError, SimulatedExchange, SimulatedExchangeExt,
};

const SYMBOL: &str = "BTC-PERP";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap()
}

fn level(price: Decimal, amount: Decimal) -> Item {
    Item::new(price, amount)
}

fn temp_log_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "trader-exchange-{}-{}-{}.log",
        name,
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ))
}

async fn cursor_over(books: Vec<OrderBook>) -> SharedCursor {
    let mut cursor = DataCursor::new(MemoryLoader::new(books, 2));
    cursor.reset(t0(), t0() + Duration::days(1)).await.unwrap();
    cursor.into_shared()
}

fn exchange(config: SimulatedExchangeConfig, cursor: SharedCursor) -> Arc<SimulatedExchange> {
    Arc::new(SimulatedExchange::new(config, cursor, Arc::new(IdGenerator::new(t0()))).unwrap())
}

/// Market buy walks two ask levels, charges the taker fee on the inverse notional.
#[tokio::test]
async fn test_market_buy_end_to_end() {
    let book = OrderBook::new(
        SYMBOL,
        t0(),
        vec![level(dec!(100), dec!(5)), level(dec!(101), dec!(5))],
        vec![level(dec!(99), dec!(5))],
    );
    let cursor = cursor_over(vec![book]).await;
    let config = SimulatedExchangeConfig::inverse(SYMBOL, "BTC", dec!(1))
        .with_fees(dec!(-0.00025), dec!(0.00075));
    let ex = exchange(config, cursor);

    let order = ex
        .place_order(SYMBOL, Side::Buy, OrderType::Market, Decimal::ZERO, dec!(8), PlaceOrderOptions::new())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.avg_price, dec!(100.375));
    let fee = dec!(8) / dec!(100.375) * dec!(0.00075);
    assert_eq!(order.commission, fee);

    let positions = ex.get_positions(SYMBOL).await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].size, dec!(8));
    assert_eq!(positions[0].avg_price, dec!(100.375));

    let balance = ex.get_balance("BTC").await.unwrap();
    assert_eq!(balance.available, dec!(1) - fee);
    assert!(matches!(
        ex.get_balance("USD").await.unwrap_err(),
        ExchangeError::AssetNotFound(_)
    ));
}

/// Same limit order: taker when it crosses at placement, maker when matched later.
#[tokio::test]
async fn test_maker_taker_split_same_notional() {
    let quiet = OrderBook::new(SYMBOL, t0(), vec![level(dec!(101), dec!(100))], vec![level(dec!(100), dec!(100))]);
    let crossed = OrderBook::new(
        SYMBOL,
        t0() + Duration::minutes(1),
        vec![level(dec!(99.5), dec!(100))],
        vec![level(dec!(99), dec!(100))],
    );
    let cursor = cursor_over(vec![quiet, crossed]).await;
    let config = SimulatedExchangeConfig::linear(SYMBOL, "USD", dec!(100000))
        .with_fees(dec!(0.0002), dec!(0.0007));

    let maker_ex = exchange(config.clone(), cursor.clone());
    let resting = maker_ex
        .place_order(SYMBOL, Side::Buy, OrderType::Limit, dec!(100), dec!(2), PlaceOrderOptions::new())
        .await
        .unwrap();
    assert_eq!(resting.status, OrderStatus::New);

    cursor.write().await.next().await.unwrap();
    maker_ex.run_event_loop_once().await.unwrap();
    let maker = maker_ex.get_order(SYMBOL, &resting.id).await.unwrap();
    assert_eq!(maker.status, OrderStatus::Filled);

    let taker_ex = exchange(config, cursor.clone());
    let taker = taker_ex
        .place_order(SYMBOL, Side::Buy, OrderType::Limit, dec!(100), dec!(2), PlaceOrderOptions::new())
        .await
        .unwrap();
    assert_eq!(taker.status, OrderStatus::Filled);

    let notional = dec!(2) * dec!(100);
    assert_eq!(maker.commission, notional * dec!(0.0002));
    assert_eq!(taker.commission, notional * dec!(0.0007));
}

/// A marketable post-only limit leaves balance and positions untouched.
#[tokio::test]
async fn test_post_only_rejection_has_no_effect() {
    let book = OrderBook::new(SYMBOL, t0(), vec![level(dec!(100), dec!(10))], vec![level(dec!(99.5), dec!(10))]);
    let cursor = cursor_over(vec![book]).await;
    let ex = exchange(
        SimulatedExchangeConfig::inverse(SYMBOL, "BTC", dec!(1)).with_fees(dec!(-0.00025), dec!(0.00075)),
        cursor,
    );
    let before = ex.account_balance().await.unwrap();

    let order = ex
        .place_order(SYMBOL, Side::Sell, OrderType::Limit, dec!(99), dec!(10), PlaceOrderOptions::new().post_only())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Rejected);
    assert_eq!(ex.account_balance().await.unwrap(), before);
    assert!(ex.get_positions(SYMBOL).await.unwrap().is_empty());
    assert!(ex.get_open_orders(SYMBOL).await.unwrap().is_empty());
}

/// Every event log line parses on its own; a placement is logged before its fill.
#[tokio::test]
async fn test_event_log_lines() {
    let book = OrderBook::new(SYMBOL, t0(), vec![level(dec!(100), dec!(10))], vec![level(dec!(99), dec!(10))]);
    let cursor = cursor_over(vec![book]).await;
    let path = temp_log_path("events");
    let log = Arc::new(EventLog::open(&path).unwrap());
    let ex = Arc::new(
        SimulatedExchange::new(
            SimulatedExchangeConfig::inverse(SYMBOL, "BTC", dec!(1)),
            cursor,
            Arc::new(IdGenerator::new(t0())),
        )
        .unwrap()
        .with_event_log(log),
    );

    ex.place_order(SYMBOL, Side::Buy, OrderType::Market, Decimal::ZERO, dec!(5), PlaceOrderOptions::new())
        .await
        .unwrap();
    let resting = ex
        .place_order(SYMBOL, Side::Sell, OrderType::Limit, dec!(105), dec!(5), PlaceOrderOptions::new())
        .await
        .unwrap();
    ex.cancel_order(SYMBOL, &resting.id).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    for line in raw.lines() {
        serde_json::from_str::<serde_json::Value>(line).unwrap();
    }

    let records = EventLog::read_records(&path).unwrap();
    let kinds: Vec<&str> = records.iter().map(|r| r.event.as_str()).collect();
    assert_eq!(kinds, vec!["order", "deal", "order", "order"]);
    assert_eq!(records[0].ts, "2019-10-01T00:00:00.000+00:00");
    assert_eq!(records[0].msg, "order placed");
    assert!(records[0].positions.is_empty());
    assert!(records[1].deal.is_some());
    assert_eq!(records[1].positions[0].size, dec!(5));
    assert!(records[1].orderbook.is_some());
    assert_eq!(records[3].order.status, OrderStatus::Cancelled);

    std::fs::remove_file(&path).ok();
}

/// Orders and positions arrive on their own typed channels.
#[tokio::test]
async fn test_typed_subscriptions() {
    let book = OrderBook::new(SYMBOL, t0(), vec![level(dec!(100), dec!(10))], vec![level(dec!(99), dec!(10))]);
    let cursor = cursor_over(vec![book]).await;
    let ex = exchange(SimulatedExchangeConfig::linear(SYMBOL, "USD", dec!(1000)), cursor);

    let mut orders = ex.subscribe_orders(SYMBOL).await.unwrap();
    let mut positions = ex.subscribe_positions(SYMBOL).await.unwrap();
    let mut books = ex.subscribe_level2_snapshots(SYMBOL).await.unwrap();
    assert!(matches!(
        ex.subscribe_trades(SYMBOL).await.unwrap_err(),
        ExchangeError::NotSupported(_)
    ));

    ex.place_order(SYMBOL, Side::Buy, OrderType::Market, Decimal::ZERO, dec!(3), PlaceOrderOptions::new())
        .await
        .unwrap();
    ex.run_event_loop_once().await.unwrap();

    assert_eq!(orders.recv().await.unwrap().status, OrderStatus::New);
    assert_eq!(orders.recv().await.unwrap().status, OrderStatus::Filled);
    assert_eq!(positions.recv().await.unwrap().size, dec!(3));
    assert_eq!(books.recv().await.unwrap().ask_price(), dec!(100));
}

/// A stop-limit triggers on a later snapshot and is a taker on that pass.
#[tokio::test]
async fn test_stop_limit_triggers_on_later_tick() {
    let books = vec![
        OrderBook::new(SYMBOL, t0(), vec![level(dec!(100), dec!(50))], vec![level(dec!(99), dec!(50))]),
        OrderBook::new(
            SYMBOL,
            t0() + Duration::minutes(1),
            vec![level(dec!(103), dec!(50))],
            vec![level(dec!(102), dec!(50))],
        ),
    ];
    let cursor = cursor_over(books).await;
    let ex = exchange(
        SimulatedExchangeConfig::linear(SYMBOL, "USD", dec!(10000)).with_fees(dec!(0.0001), dec!(0.001)),
        cursor.clone(),
    );

    let stop = ex
        .place_order(
            SYMBOL,
            Side::Buy,
            OrderType::StopLimit,
            dec!(104),
            dec!(1),
            PlaceOrderOptions::new().with_stop_px(dec!(102)),
        )
        .await
        .unwrap();
    assert_eq!(stop.status, OrderStatus::New);

    ex.run_event_loop_once().await.unwrap();
    assert!(!ex.get_order(SYMBOL, &stop.id).await.unwrap().triggered);

    cursor.write().await.next().await.unwrap();
    ex.run_event_loop_once().await.unwrap();
    let filled = ex.get_order(SYMBOL, &stop.id).await.unwrap();
    assert!(filled.triggered);
    assert_eq!(filled.status, OrderStatus::Filled);
    assert_eq!(filled.avg_price, dec!(104));
    assert_eq!(filled.commission, dec!(104) * dec!(0.001));
}

/// Without a current snapshot orders cannot be placed.
#[tokio::test]
async fn test_no_market_data() {
    let cursor = DataCursor::new(MemoryLoader::new(vec![], 10)).into_shared();
    let ex = exchange(SimulatedExchangeConfig::inverse(SYMBOL, "BTC", dec!(1)), cursor);
    let err = ex
        .place_order(SYMBOL, Side::Buy, OrderType::Market, Decimal::ZERO, dec!(1), PlaceOrderOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::NoMarketData(_)));
    assert!(ex.current_order_book().await.is_none());
}

/// Closing a long and reopening short on an inverse contract settles PnL in coin.
#[tokio::test]
async fn test_inverse_flip_end_to_end() {
    let books = vec![
        OrderBook::new(SYMBOL, t0(), vec![level(dec!(8000), dec!(1000))], vec![level(dec!(7999), dec!(1000))]),
        OrderBook::new(
            SYMBOL,
            t0() + Duration::minutes(1),
            vec![level(dec!(10001), dec!(1000))],
            vec![level(dec!(10000), dec!(1000))],
        ),
    ];
    let cursor = cursor_over(books).await;
    let ex = exchange(SimulatedExchangeConfig::inverse(SYMBOL, "BTC", dec!(1)), cursor.clone());

    ex.place_order(SYMBOL, Side::Buy, OrderType::Market, Decimal::ZERO, dec!(100), PlaceOrderOptions::new())
        .await
        .unwrap();
    cursor.write().await.next().await.unwrap();
    let flip = ex
        .place_order(SYMBOL, Side::Sell, OrderType::Market, Decimal::ZERO, dec!(300), PlaceOrderOptions::new())
        .await
        .unwrap();

    assert_eq!(flip.status, OrderStatus::Filled);
    assert_eq!(flip.pnl, dec!(0.0025));
    let positions = ex.get_positions(SYMBOL).await.unwrap();
    assert_eq!(positions[0].size, dec!(-200));
    assert_eq!(positions[0].avg_price, dec!(10000));

    // 숏은 매도호가로 평가: 200/10001 - 200/10000 만큼 손실
    let balance = ex.account_balance().await.unwrap();
    assert_eq!(balance.available, dec!(1.0025));
    assert!(balance.equity < balance.available);
}

/// A cursor carrying another instrument is not market data for this exchange.
#[tokio::test]
async fn test_foreign_symbol_cursor() {
    let book = OrderBook::new("ETH-PERP", t0(), vec![level(dec!(200), dec!(10))], vec![level(dec!(199), dec!(10))]);
    let cursor = cursor_over(vec![book]).await;
    let ex = exchange(SimulatedExchangeConfig::inverse(SYMBOL, "BTC", dec!(1)), cursor);

    let err = ex
        .place_order(SYMBOL, Side::Buy, OrderType::Market, Decimal::ZERO, dec!(1), PlaceOrderOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::NoMarketData(_)));
    assert_eq!(ex.order_count().await, 0);
    assert!(ex.get_positions(SYMBOL).await.unwrap().is_empty());
}

/// An unwritable event log does not turn a committed fill into an error.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_event_log_write_failure_keeps_order() {
    let book = OrderBook::new(SYMBOL, t0(), vec![level(dec!(100), dec!(10))], vec![level(dec!(99), dec!(10))]);
    let cursor = cursor_over(vec![book]).await;
    let log = Arc::new(EventLog::open("/dev/full").unwrap());
    let ex = Arc::new(
        SimulatedExchange::new(
            SimulatedExchangeConfig::linear(SYMBOL, "USD", dec!(1000)),
            cursor,
            Arc::new(IdGenerator::new(t0())),
        )
        .unwrap()
        .with_event_log(log),
    );
    let mut orders = ex.subscribe_orders(SYMBOL).await.unwrap();

    let order = ex
        .place_order(SYMBOL, Side::Buy, OrderType::Market, Decimal::ZERO, dec!(1), PlaceOrderOptions::new())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(ex.order_count().await, 1);
    assert_eq!(ex.get_positions(SYMBOL).await.unwrap()[0].size, dec!(1));
    assert_eq!(orders.recv().await.unwrap().status, OrderStatus::New);
    assert_eq!(orders.recv().await.unwrap().status, OrderStatus::Filled);
}
