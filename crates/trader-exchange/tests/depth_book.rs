//! Integration tests for the shared depth order book handle.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_exchange::{BookSide, DeltaAction, DepthBookError, DepthEntry, DepthMessage, DepthOrderBook};

const SYMBOL: &str = "BTC-PERP";

fn snapshot(change_id: u64) -> DepthMessage {
    DepthMessage::snapshot(
        SYMBOL,
        Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap(),
        change_id,
        &[(dec!(100.5), dec!(10)), (dec!(101), dec!(20)), (dec!(101.5), dec!(5))],
        &[(dec!(100), dec!(7)), (dec!(99.5), dec!(3))],
    )
}

fn change(prev: u64, id: u64, entries: Vec<DepthEntry>) -> DepthMessage {
    DepthMessage::change(
        SYMBOL,
        Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 1).unwrap(),
        prev,
        id,
        entries,
    )
}

#[tokio::test]
async fn test_snapshot_then_deltas_top_n() {
    let book = DepthOrderBook::new();
    book.update(&snapshot(1)).await.unwrap();
    book.update(&change(
        1,
        2,
        vec![
            DepthEntry::new(BookSide::Ask, DeltaAction::Delete, dec!(100.5), Decimal::ZERO),
            DepthEntry::new(BookSide::Bid, DeltaAction::New, dec!(100.25), dec!(4)),
            DepthEntry::new(BookSide::Ask, DeltaAction::Change, dec!(101), dec!(0)),
        ],
    ))
    .await
    .unwrap();

    let top = book.get_order_book(SYMBOL, 2).await.unwrap();
    assert_eq!(top.ask_price(), dec!(101.5));
    assert_eq!(top.asks.len(), 1);
    assert_eq!(top.bid_price(), dec!(100.25));
    assert_eq!(top.bids.len(), 2);
    assert_eq!(top.bids[1].price, dec!(100));
    assert!(book.is_synced(SYMBOL).await);
}

#[tokio::test]
async fn test_stale_base_requires_resync() {
    let book = DepthOrderBook::new();
    book.update(&snapshot(5)).await.unwrap();

    let err = book
        .update(&change(4, 6, vec![DepthEntry::new(BookSide::Bid, DeltaAction::New, dec!(98), dec!(1))]))
        .await
        .unwrap_err();
    assert!(matches!(err, DepthBookError::Desync { .. }));
    assert!(!book.is_synced(SYMBOL).await);
    assert!(book.get_order_book(SYMBOL, 5).await.is_err());

    book.update(&snapshot(10)).await.unwrap();
    assert!(book.is_synced(SYMBOL).await);
    assert_eq!(book.get_order_book(SYMBOL, 5).await.unwrap().asks.len(), 3);
}

#[tokio::test]
async fn test_concurrent_readers_see_consistent_books() {
    let book = DepthOrderBook::new();
    book.update(&snapshot(1)).await.unwrap();

    let writer = {
        let book = book.clone();
        tokio::spawn(async move {
            for id in 1..50u64 {
                let size = Decimal::from(id);
                book.update(&change(
                    id,
                    id + 1,
                    vec![DepthEntry::new(BookSide::Bid, DeltaAction::Change, dec!(100), size)],
                ))
                .await
                .unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let book = book.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let snap = book.get_order_book(SYMBOL, 10).await.unwrap();
                assert!(snap.asks.windows(2).all(|w| w[0].price < w[1].price));
                assert!(snap.bids.windows(2).all(|w| w[0].price > w[1].price));
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(book.symbols().await, vec![SYMBOL.to_string()]);
    assert_eq!(book.get_order_book(SYMBOL, 1).await.unwrap().bids[0].amount, dec!(49));
    assert!(book.remove(SYMBOL).await);
    assert!(matches!(
        book.get_order_book(SYMBOL, 1).await.unwrap_err(),
        DepthBookError::UnknownSymbol(_)
    ));
}
