use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trader_core::OrderBook;

use super::DataLoader;
use crate::error::Result;

/// 메모리에 올린 스냅샷 목록을 페이지 단위로 돌려주는 로더.
///
/// 테스트와 합성 데이터 백테스트에서 사용합니다.
#[derive(Debug, Clone)]
pub struct MemoryLoader {
    books: Vec<OrderBook>,
    page_size: usize,
    /// 구간에 포함되는 스냅샷 인덱스 범위
    range: std::ops::Range<usize>,
    pos: usize,
}

impl MemoryLoader {
    /// 새 로더를 생성합니다. 스냅샷은 시각 순으로 정렬됩니다.
    pub fn new(mut books: Vec<OrderBook>, page_size: usize) -> Self {
        books.sort_by_key(|b| b.time);
        let len = books.len();
        Self {
            books,
            page_size: page_size.max(1),
            range: 0..len,
            pos: 0,
        }
    }

    /// 보유한 전체 스냅샷 수.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// 스냅샷이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[async_trait]
impl DataLoader for MemoryLoader {
    async fn setup(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        let from = self.books.partition_point(|b| b.time < start);
        let to = self.books.partition_point(|b| b.time < end).max(from);
        self.range = from..to;
        self.pos = from;
        Ok(())
    }

    async fn read_data(&mut self) -> Result<Vec<OrderBook>> {
        let to = (self.pos + self.page_size).min(self.range.end);
        let page = self.books[self.pos..to].to_vec();
        self.pos = to;
        Ok(page)
    }

    fn has_more_data(&self) -> bool {
        self.pos < self.range.end
    }
}
