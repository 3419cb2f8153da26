//! 과거 호가창 데이터 로더.
//!
//! 모든 로더는 같은 계약을 따릅니다: `setup(start, end)`로 구간을 정하고,
//! `has_more_data()`가 참인 동안 `read_data()`로 시간순 페이지를 읽습니다.

mod csv_file;
mod memory;

pub use csv_file::{parse_timestamp, write_order_books_csv, CsvOrderBookLoader};
pub use memory::MemoryLoader;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trader_core::OrderBook;

use crate::error::Result;

/// 페이지 단위 과거 호가창 소스.
#[async_trait]
pub trait DataLoader: Send + Sync {
    /// 읽을 구간 `[start, end)`를 설정하고 처음부터 다시 읽도록 초기화합니다.
    async fn setup(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()>;

    /// 다음 페이지를 시간 오름차순으로 읽습니다. 페이지 크기는 유한합니다.
    async fn read_data(&mut self) -> Result<Vec<OrderBook>>;

    /// 더 읽을 데이터가 있는지 확인합니다.
    fn has_more_data(&self) -> bool;
}
