//! 고정 폭 CSV 호가창 로더.
//!
//! 한 행은 `timestamp, ask0price, ask0size, ..., bid0price, bid0size, ...` 형식입니다.
//! 매도 호가 `depth`단계가 먼저, 매수 호가 `depth`단계가 뒤에 옵니다.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use trader_core::{Item, OrderBook};

use super::DataLoader;
use crate::error::{DataError, Result};

/// 한 번에 읽는 기본 행 수.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// CSV 파일에서 호가창 스냅샷을 읽는 로더.
pub struct CsvOrderBookLoader {
    path: PathBuf,
    symbol: String,
    depth: usize,
    page_size: usize,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    reader: Option<csv::Reader<File>>,
    record: StringRecord,
    exhausted: bool,
    rows_read: u64,
}

impl CsvOrderBookLoader {
    /// 새 로더를 생성합니다. 파일은 `setup` 시점에 열립니다.
    pub fn new(path: impl AsRef<Path>, symbol: impl Into<String>, depth: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            symbol: symbol.into(),
            depth: depth.max(1),
            page_size: DEFAULT_PAGE_SIZE,
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
            reader: None,
            record: StringRecord::new(),
            exhausted: false,
            rows_read: 0,
        }
    }

    /// 페이지 크기를 설정합니다.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// 지금까지 읽은 행 수 (헤더 포함).
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

#[async_trait]
impl DataLoader for CsvOrderBookLoader {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn setup(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_path(&self.path)?;

        self.reader = Some(reader);
        self.start = start;
        self.end = end;
        self.exhausted = false;
        self.rows_read = 0;
        Ok(())
    }

    async fn read_data(&mut self) -> Result<Vec<OrderBook>> {
        let reader = self.reader.as_mut().ok_or(DataError::NotInitialized)?;
        let mut page = Vec::with_capacity(self.page_size);

        while page.len() < self.page_size {
            if !reader.read_record(&mut self.record)? {
                self.exhausted = true;
                break;
            }
            let first_row = self.rows_read == 0;
            self.rows_read += 1;
            let line = self
                .record
                .position()
                .map(|p| p.line())
                .unwrap_or(self.rows_read);

            let Some(book) = parse_row(&self.symbol, self.depth, &self.record, line, first_row)?
            else {
                continue;
            };
            if book.time < self.start {
                continue;
            }
            if book.time >= self.end {
                self.exhausted = true;
                break;
            }
            page.push(book);
        }

        debug!(
            symbol = %self.symbol,
            count = page.len(),
            rows = self.rows_read,
            "CSV 페이지 로드"
        );
        Ok(page)
    }

    fn has_more_data(&self) -> bool {
        self.reader.is_some() && !self.exhausted
    }
}

/// 타임스탬프 문자열을 파싱합니다.
///
/// RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]`(UTC), 에포크 밀리초를 지원합니다.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&t));
    }
    s.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// 스냅샷을 로더가 읽는 형식의 CSV로 씁니다. 헤더 행을 포함하며 기록한 스냅샷 수를 반환합니다.
///
/// `depth`보다 얕은 쪽 호가는 빈 칸으로 채웁니다.
pub fn write_order_books_csv(
    path: impl AsRef<Path>,
    books: &[OrderBook],
    depth: usize,
) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let depth = depth.max(1);
    let mut writer = WriterBuilder::new().from_path(path)?;

    let mut header = Vec::with_capacity(1 + depth * 4);
    header.push("timestamp".to_string());
    for side in ["ask", "bid"] {
        for i in 0..depth {
            header.push(format!("{}{}price", side, i));
            header.push(format!("{}{}size", side, i));
        }
    }
    writer.write_record(&header)?;

    for book in books {
        let mut row = Vec::with_capacity(header.len());
        row.push(book.time.to_rfc3339());
        for levels in [&book.asks, &book.bids] {
            for i in 0..depth {
                match levels.get(i) {
                    Some(level) => {
                        row.push(level.price.to_string());
                        row.push(level.amount.to_string());
                    }
                    None => {
                        row.push(String::new());
                        row.push(String::new());
                    }
                }
            }
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), count = books.len(), depth, "CSV 저장");
    Ok(books.len())
}

fn parse_row(
    symbol: &str,
    depth: usize,
    record: &StringRecord,
    line: u64,
    first_row: bool,
) -> Result<Option<OrderBook>> {
    let raw_ts = record.get(0).unwrap_or_default();
    let Some(time) = parse_timestamp(raw_ts) else {
        // 첫 행이 타임스탬프가 아니면 헤더로 간주
        if first_row {
            return Ok(None);
        }
        return Err(DataError::ParseError {
            line,
            message: format!("invalid timestamp '{}'", raw_ts),
        });
    };

    let expected = 1 + depth * 4;
    if record.len() < expected {
        return Err(DataError::ParseError {
            line,
            message: format!("expected {} columns, found {}", expected, record.len()),
        });
    }

    let asks = parse_levels(record, 1, depth, line)?;
    let bids = parse_levels(record, 1 + depth * 2, depth, line)?;
    Ok(Some(OrderBook::new(symbol, time, asks, bids)))
}

fn parse_levels(record: &StringRecord, from: usize, depth: usize, line: u64) -> Result<Vec<Item>> {
    let mut levels = Vec::with_capacity(depth);
    for i in 0..depth {
        let price = record.get(from + i * 2).unwrap_or_default();
        let size = record.get(from + i * 2 + 1).unwrap_or_default();
        if price.is_empty() || size.is_empty() {
            continue;
        }
        let price = parse_decimal(price, line)?;
        let size = parse_decimal(size, line)?;
        if size <= Decimal::ZERO || price <= Decimal::ZERO {
            continue;
        }
        levels.push(Item::new(price, size));
    }
    Ok(levels)
}

fn parse_decimal(s: &str, line: u64) -> Result<Decimal> {
    s.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| DataError::ParseError {
            line,
            message: format!("invalid number '{}': {}", s, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2019-10-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2019-10-01T08:00:00+08:00"), Some(expected));
        assert_eq!(parse_timestamp("2019-10-01 00:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("1569888000000"), Some(expected));
        assert_eq!(parse_timestamp("t"), None);
    }

    #[test]
    fn test_parse_row_skips_empty_levels() {
        let record = StringRecord::from(vec![
            "2019-10-01T00:00:00Z",
            "100.5",
            "10",
            "101",
            "0",
            "100",
            "7",
            "",
            "",
        ]);
        let book = parse_row("BTC-PERP", 2, &record, 1, false).unwrap().unwrap();
        assert_eq!(book.asks, vec![Item::new(dec!(100.5), dec!(10))]);
        assert_eq!(book.bids, vec![Item::new(dec!(100), dec!(7))]);
    }

    #[test]
    fn test_header_only_on_first_row() {
        let header = StringRecord::from(vec!["t", "a0p", "a0s", "b0p", "b0s"]);
        assert!(parse_row("X", 1, &header, 1, true).unwrap().is_none());
        assert!(parse_row("X", 1, &header, 5, false).is_err());
    }

    #[test]
    fn test_short_row_is_error() {
        let record = StringRecord::from(vec!["2019-10-01T00:00:00Z", "1", "2"]);
        let err = parse_row("X", 1, &record, 9, false).unwrap_err();
        assert!(matches!(err, DataError::ParseError { line: 9, .. }));
    }
}
