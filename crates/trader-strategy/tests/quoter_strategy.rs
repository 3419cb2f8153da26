//! QuoterStrategy against a simulated exchange.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use trader_core::{IdGenerator, Item, OrderBook, OrderStatus, SimulatedExchangeConfig};
use trader_data::{DataCursor, MemoryLoader};
use trader_exchange::{Exchange, SimulatedExchange, SimulatedExchangeExt};
use trader_strategy::{QuoterConfig, QuoterStrategy, Strategy, StrategyContext, TradeMode};

const SYMBOL: &str = "BTC-PERP";

fn book(minute: i64, bid: rust_decimal::Decimal, ask: rust_decimal::Decimal) -> OrderBook {
    OrderBook::new(
        SYMBOL,
        Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
        vec![Item::new(ask, dec!(1000))],
        vec![Item::new(bid, dec!(1000))],
    )
}

#[tokio::test]
async fn test_quotes_rest_then_fill_as_maker() {
    let start = Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap();
    let books = vec![
        book(0, dec!(99.5), dec!(100)),
        // 매도 호가가 내려와 매수 호가 체결
        book(1, dec!(99), dec!(99.5)),
    ];
    let mut cursor = DataCursor::new(MemoryLoader::new(books, 10));
    cursor.reset(start, start + Duration::hours(1)).await.unwrap();
    let cursor = cursor.into_shared();

    let exchange = Arc::new(
        SimulatedExchange::new(
            SimulatedExchangeConfig::inverse(SYMBOL, "BTC", dec!(1)).with_fees(dec!(-0.00025), dec!(0.00075)),
            cursor.clone(),
            Arc::new(IdGenerator::new(start)),
        )
        .unwrap(),
    );
    let ctx = StrategyContext::new(TradeMode::Backtest, vec![exchange.clone().as_exchange()]);

    let mut strategy = QuoterStrategy::new(
        SYMBOL,
        QuoterConfig {
            order_size: dec!(10),
            max_inventory: dec!(100),
            refresh_ticks: 10,
        },
    );
    strategy.on_init(&ctx).await.unwrap();
    strategy.on_tick(&ctx).await.unwrap();

    let open = exchange.get_open_orders(SYMBOL).await.unwrap();
    assert_eq!(open.len(), 2);
    assert!(open.iter().all(|o| o.post_only && o.status == OrderStatus::New));

    exchange.run_event_loop_once().await.unwrap();
    cursor.write().await.next().await.unwrap();
    strategy.on_tick(&ctx).await.unwrap();
    exchange.run_event_loop_once().await.unwrap();

    let positions = exchange.get_positions(SYMBOL).await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].size, dec!(10));
    assert_eq!(positions[0].avg_price, dec!(99.5));

    // 메이커 리베이트로 잔고 증가
    let balance = exchange.get_balance("BTC").await.unwrap();
    assert!(balance.available > dec!(1));

    strategy.on_exit(&ctx).await.unwrap();
    assert!(exchange.get_open_orders(SYMBOL).await.unwrap().is_empty());
    assert_eq!(strategy.get_state()["quotes_placed"], 2);
}
