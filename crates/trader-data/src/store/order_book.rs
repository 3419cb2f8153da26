//! PostgreSQL 호가창 스냅샷 로더.
//!
//! 테이블 스키마:
//!
//! ```sql
//! CREATE TABLE order_book_snapshots (
//!     symbol TEXT NOT NULL,
//!     ts     TIMESTAMPTZ NOT NULL,
//!     asks   JSONB NOT NULL,  -- [[price, amount], ...] 오름차순
//!     bids   JSONB NOT NULL,  -- [[price, amount], ...] 내림차순
//!     PRIMARY KEY (symbol, ts)
//! );
//! ```
//!
//! 페이지는 `ts` 오름차순으로 읽고, 마지막으로 읽은 시각 이후부터 다음 페이지를 가져옵니다.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info, instrument};
use trader_core::{Item, OrderBook};

use crate::error::{DataError, Result};
use crate::loader::DataLoader;

/// 호가창 스냅샷 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct OrderBookRow {
    pub symbol: String,
    pub ts: DateTime<Utc>,
    /// JSON 텍스트 `[[price, amount], ...]`
    pub asks: String,
    /// JSON 텍스트 `[[price, amount], ...]`
    pub bids: String,
}

impl OrderBookRow {
    /// OrderBook 도메인 객체로 변환.
    ///
    /// 가격/수량은 숫자 또는 문자열 모두 허용합니다.
    pub fn to_order_book(&self) -> Result<OrderBook> {
        let asks = parse_levels(&self.asks)?;
        let bids = parse_levels(&self.bids)?;
        Ok(OrderBook::new(self.symbol.clone(), self.ts, asks, bids))
    }
}

fn parse_levels(json: &str) -> Result<Vec<Item>> {
    let levels: Vec<(Decimal, Decimal)> = serde_json::from_str(json)?;
    Ok(levels
        .into_iter()
        .filter(|(_, amount)| *amount > Decimal::ZERO)
        .map(|(price, amount)| Item::new(price, amount))
        .collect())
}

/// PostgreSQL에서 구간 쿼리를 페이지 단위로 실행하는 로더.
pub struct PgOrderBookLoader {
    pool: PgPool,
    symbol: String,
    page_size: usize,
    end: DateTime<Utc>,
    /// 이 시각 이후(제외)부터 다음 페이지를 읽음
    after: Option<DateTime<Utc>>,
    has_more: bool,
}

impl PgOrderBookLoader {
    /// 기존 연결 풀로 로더를 생성합니다.
    pub fn new(pool: PgPool, symbol: impl Into<String>, page_size: usize) -> Self {
        Self {
            pool,
            symbol: symbol.into(),
            page_size: page_size.max(1),
            end: DateTime::<Utc>::MAX_UTC,
            after: None,
            has_more: false,
        }
    }

    /// 데이터베이스에 연결하여 로더를 생성합니다.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, symbol: &str, page_size: usize) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!(symbol = symbol, "호가창 DB 연결 완료");
        Ok(Self::new(pool, symbol, page_size))
    }
}

#[async_trait]
impl DataLoader for PgOrderBookLoader {
    async fn setup(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        // timestamptz 정밀도는 마이크로초
        self.after = Some(start - Duration::microseconds(1));
        self.end = end;
        self.has_more = true;
        Ok(())
    }

    #[instrument(skip(self), fields(symbol = %self.symbol))]
    async fn read_data(&mut self) -> Result<Vec<OrderBook>> {
        let after = self.after.ok_or(DataError::NotInitialized)?;

        let rows: Vec<OrderBookRow> = sqlx::query_as(
            r#"
            SELECT symbol, ts, asks::text AS asks, bids::text AS bids
            FROM order_book_snapshots
            WHERE symbol = $1 AND ts > $2 AND ts < $3
            ORDER BY ts ASC
            LIMIT $4
            "#,
        )
        .bind(&self.symbol)
        .bind(after)
        .bind(self.end)
        .bind(self.page_size as i64)
        .fetch_all(&self.pool)
        .await?;

        if rows.len() < self.page_size {
            self.has_more = false;
        }
        if let Some(last) = rows.last() {
            self.after = Some(last.ts);
        }

        let books = rows
            .iter()
            .map(OrderBookRow::to_order_book)
            .collect::<Result<Vec<_>>>()?;

        debug!(count = books.len(), "DB에서 호가창 페이지 조회");
        Ok(books)
    }

    fn has_more_data(&self) -> bool {
        self.has_more
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_to_order_book() {
        let row = OrderBookRow {
            symbol: "BTC-PERP".to_string(),
            ts: Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap(),
            asks: r#"[["8000.5", "120"], [8001, 0], [8001.5, 40]]"#.to_string(),
            bids: r#"[[7999.5, 80], ["8000", "15"]]"#.to_string(),
        };

        let book = row.to_order_book().unwrap();
        assert_eq!(book.asks.len(), 2);
        assert_eq!(book.ask_price(), dec!(8000.5));
        assert_eq!(book.bid_price(), dec!(8000));
        assert_eq!(book.bids[1].amount, dec!(80));
    }

    #[test]
    fn test_row_with_bad_json() {
        let row = OrderBookRow {
            symbol: "BTC-PERP".to_string(),
            ts: Utc::now(),
            asks: "not json".to_string(),
            bids: "[]".to_string(),
        };
        assert!(matches!(
            row.to_order_book(),
            Err(DataError::SerializationError(_))
        ));
    }
}
