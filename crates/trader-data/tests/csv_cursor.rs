//! CSV round trip through the loader and the replay cursor.

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use trader_data::{
    generate_sample_order_books, write_order_books_csv, CsvOrderBookLoader, DataCursor,
    DataError, SampleSpec,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap()
}

fn temp_csv(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "trader-data-{}-{}-{}.csv",
        name,
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ))
}

#[tokio::test]
async fn test_generated_csv_replays_in_order() {
    let spec = SampleSpec::new("BTC-PERP", t0(), 60, dec!(8000))
        .with_seed(42)
        .with_depth(3);
    let books = generate_sample_order_books(&spec);
    let path = temp_csv("replay");
    assert_eq!(write_order_books_csv(&path, &books, 3).unwrap(), 60);

    let loader = CsvOrderBookLoader::new(&path, "BTC-PERP", 3).with_page_size(7);
    let mut cursor = DataCursor::new(loader).with_limits(16, 4);
    assert!(cursor.reset(t0(), t0() + Duration::days(1)).await.unwrap());

    let mut replayed = vec![cursor.current().cloned().unwrap()];
    let mut last_index = cursor.index();
    while cursor.next().await.unwrap() {
        assert_eq!(cursor.index(), last_index + 1);
        last_index = cursor.index();
        replayed.push(cursor.current().cloned().unwrap());
    }

    assert_eq!(replayed, books);
    assert_eq!(cursor.max_index(), 59);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_range_filter_is_half_open() {
    let spec = SampleSpec::new("BTC-PERP", t0(), 10, dec!(8000)).with_depth(2);
    let books = generate_sample_order_books(&spec);
    let path = temp_csv("range");
    write_order_books_csv(&path, &books, 2).unwrap();

    let start = t0() + Duration::minutes(2);
    let end = t0() + Duration::minutes(5);
    let mut cursor = DataCursor::new(CsvOrderBookLoader::new(&path, "BTC-PERP", 2));
    assert!(cursor.reset(start, end).await.unwrap());

    let mut times = vec![cursor.current().unwrap().time];
    while cursor.next().await.unwrap() {
        times.push(cursor.current().unwrap().time);
    }
    assert_eq!(
        times,
        vec![start, start + Duration::minutes(1), start + Duration::minutes(2)]
    );

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_malformed_row_reports_line() {
    let path = temp_csv("bad");
    std::fs::write(
        &path,
        "timestamp,ask0price,ask0size,bid0price,bid0size\n\
         2019-10-01T00:00:00Z,101,1,100,1\n\
         not-a-time,101,1,100,1\n",
    )
    .unwrap();

    let mut cursor = DataCursor::new(CsvOrderBookLoader::new(&path, "BTC-PERP", 1));
    let err = cursor.reset(t0(), t0() + Duration::days(1)).await.unwrap_err();
    assert!(matches!(err, DataError::ParseError { line: 3, .. }));

    let _ = std::fs::remove_file(&path);
}
