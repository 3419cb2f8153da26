//! 윈도우 기반 순방향 데이터 커서.
//!
//! 로더에서 읽은 스냅샷을 버퍼에 쌓고, 버퍼가 소진되면 다음 페이지를 읽어 이어 붙입니다.
//! 버퍼가 `max_buffered`를 넘으면 오래된 스냅샷을 버리고 `offset`을 전진시킵니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use trader_core::OrderBook;

use crate::error::{DataError, Result};
use crate::loader::DataLoader;

/// 여러 시뮬레이션 거래소와 드라이버가 공유하는 커서 핸들.
pub type SharedCursor = Arc<RwLock<DataCursor>>;

/// 기본 버퍼 상한.
const DEFAULT_MAX_BUFFERED: usize = 10_000;

/// 기본 보존 이력 수.
const DEFAULT_LOOKBACK: usize = 500;

/// 순방향 호가창 커서.
pub struct DataCursor {
    loader: Box<dyn DataLoader>,
    window: Vec<OrderBook>,
    /// 윈도우 내 현재 위치
    index: usize,
    /// 윈도우 시작의 절대 인덱스
    offset: usize,
    max_buffered: usize,
    lookback: usize,
}

impl DataCursor {
    /// 로더로 커서를 생성합니다. `reset` 전까지 현재 스냅샷은 없습니다.
    pub fn new(loader: impl DataLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            window: Vec::new(),
            index: 0,
            offset: 0,
            max_buffered: DEFAULT_MAX_BUFFERED,
            lookback: DEFAULT_LOOKBACK,
        }
    }

    /// 버퍼 상한과 보존 이력 수를 설정합니다.
    pub fn with_limits(mut self, max_buffered: usize, lookback: usize) -> Self {
        self.max_buffered = max_buffered.max(1);
        self.lookback = lookback.min(self.max_buffered.saturating_sub(1));
        self
    }

    /// 공유 핸들로 감쌉니다.
    pub fn into_shared(self) -> SharedCursor {
        Arc::new(RwLock::new(self))
    }

    /// 구간 `[start, end)`로 되감고 첫 스냅샷을 로드합니다.
    ///
    /// 구간에 데이터가 있으면 `true`.
    pub async fn reset(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<bool> {
        self.loader.setup(start, end).await?;
        self.window.clear();
        self.index = 0;
        self.offset = 0;
        let loaded = self.fill().await?;
        debug!(%start, %end, loaded, "데이터 커서 초기화");
        Ok(loaded)
    }

    /// 다음 스냅샷으로 이동합니다. 데이터가 끝났으면 `false`.
    pub async fn next(&mut self) -> Result<bool> {
        if self.index + 1 < self.window.len() {
            self.index += 1;
            return Ok(true);
        }
        if !self.fill().await? {
            return Ok(false);
        }
        if self.index + 1 < self.window.len() {
            self.index += 1;
            return Ok(true);
        }
        Ok(false)
    }

    /// 현재 스냅샷.
    pub fn current(&self) -> Option<&OrderBook> {
        self.window.get(self.index)
    }

    /// 현재 스냅샷의 절대 인덱스.
    pub fn index(&self) -> usize {
        self.offset + self.index
    }

    /// 버퍼에 올라온 마지막 스냅샷의 절대 인덱스.
    pub fn max_index(&self) -> usize {
        (self.offset + self.window.len()).saturating_sub(1)
    }

    /// 버퍼 시작의 절대 인덱스.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 현재 스냅샷을 포함한 최근 `n`개 (오래된 것부터).
    pub fn history(&self, n: usize) -> &[OrderBook] {
        if self.window.is_empty() {
            return &[];
        }
        let end = self.index + 1;
        let start = end.saturating_sub(n);
        &self.window[start..end]
    }

    /// 로더에서 한 페이지 이상을 읽어 윈도우에 붙입니다. 더 읽은 것이 없으면 `false`.
    async fn fill(&mut self) -> Result<bool> {
        while self.loader.has_more_data() {
            let page = self.loader.read_data().await?;
            if page.is_empty() {
                continue;
            }
            self.append(page)?;
            self.trim();
            return Ok(true);
        }
        Ok(false)
    }

    fn append(&mut self, page: Vec<OrderBook>) -> Result<()> {
        let mut last = self.window.last().map(|b| b.time);
        for book in &page {
            if let Some(prev) = last {
                if book.time < prev {
                    return Err(DataError::InvalidData(format!(
                        "snapshot at {} is older than previous {}",
                        book.time, prev
                    )));
                }
            }
            last = Some(book.time);
        }
        trace!(count = page.len(), "윈도우에 페이지 추가");
        self.window.extend(page);
        Ok(())
    }

    fn trim(&mut self) {
        if self.window.len() <= self.max_buffered {
            return;
        }
        let over = self.window.len() - self.max_buffered;
        let droppable = self.index.saturating_sub(self.lookback);
        let drop = over.min(droppable);
        if drop == 0 {
            return;
        }
        self.window.drain(..drop);
        self.offset += drop;
        self.index -= drop;
        trace!(drop, offset = self.offset, "오래된 스냅샷 제거");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap()
    }

    fn books(n: i64) -> Vec<OrderBook> {
        (0..n)
            .map(|i| OrderBook::new("BTC-PERP", t0() + Duration::seconds(i), vec![], vec![]))
            .collect()
    }

    #[tokio::test]
    async fn test_walks_across_pages() {
        let mut cursor = DataCursor::new(MemoryLoader::new(books(7), 3));
        assert!(cursor.current().is_none());
        assert!(cursor.reset(t0(), t0() + Duration::hours(1)).await.unwrap());

        let mut times = vec![cursor.current().unwrap().time];
        while cursor.next().await.unwrap() {
            times.push(cursor.current().unwrap().time);
        }
        assert_eq!(times.len(), 7);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(cursor.index(), 6);
        assert!(!cursor.next().await.unwrap());
    }

    #[tokio::test]
    async fn test_trim_keeps_absolute_index() {
        let mut cursor = DataCursor::new(MemoryLoader::new(books(50), 4)).with_limits(8, 2);
        cursor.reset(t0(), t0() + Duration::hours(1)).await.unwrap();

        let mut last = cursor.index();
        while cursor.next().await.unwrap() {
            assert_eq!(cursor.index(), last + 1);
            assert_eq!(
                cursor.current().unwrap().time,
                t0() + Duration::seconds(cursor.index() as i64)
            );
            last = cursor.index();
        }
        assert_eq!(last, 49);
        assert!(cursor.offset() > 0);
        assert!(cursor.history(10).len() >= 3);
        assert_eq!(cursor.history(1)[0].time, t0() + Duration::seconds(49));
    }

    #[tokio::test]
    async fn test_empty_range() {
        let mut cursor = DataCursor::new(MemoryLoader::new(books(3), 10));
        let later = t0() + Duration::days(1);
        assert!(!cursor.reset(later, later + Duration::hours(1)).await.unwrap());
        assert!(cursor.current().is_none());
        assert!(cursor.history(5).is_empty());
    }
}
