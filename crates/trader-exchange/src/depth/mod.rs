//! 증분 피드로 유지되는 깊이 호가창.
//!
//! 하나의 WS 디스패처가 `update`로 쓰고, 다른 경로는 `get_order_book`으로 동시에 읽습니다.
//! 유실/역전된 증분은 복구하지 않고 `Desync`로 보고합니다. 호출자는 새 스냅샷을 요청해야 합니다.

mod local_book;
mod message;

pub use local_book::LocalOrderBook;
pub use message::{BookSide, DeltaAction, DepthEntry, DepthMessage, DepthMessageKind};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error};
use trader_core::OrderBook;

use crate::error::DepthBookError;

/// 여러 심볼의 로컬 호가창 (복제 가능한 공유 핸들).
#[derive(Debug, Clone, Default)]
pub struct DepthOrderBook {
    books: Arc<RwLock<HashMap<String, LocalOrderBook>>>,
}

impl DepthOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// 메시지를 해당 심볼 호가창에 적용합니다.
    pub async fn update(&self, msg: &DepthMessage) -> Result<(), DepthBookError> {
        let mut books = self.books.write().await;
        let book = books
            .entry(msg.symbol.clone())
            .or_insert_with(|| LocalOrderBook::new(msg.symbol.clone()));

        match book.update(msg) {
            Ok(()) => {
                debug!(
                    symbol = %msg.symbol,
                    change_id = msg.change_id,
                    snapshot = msg.is_snapshot(),
                    "depth book updated"
                );
                Ok(())
            }
            Err(e) => {
                error!(symbol = %msg.symbol, error = %e, "depth book desync, snapshot resync required");
                Err(e)
            }
        }
    }

    /// 최우선 `depth`단계 스냅샷.
    pub async fn get_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBook, DepthBookError> {
        let books = self.books.read().await;
        books
            .get(symbol)
            .ok_or_else(|| DepthBookError::UnknownSymbol(symbol.to_string()))?
            .snapshot(depth)
    }

    /// 심볼 호가창이 동기화 상태인지 확인합니다. 모르는 심볼이면 `false`.
    pub async fn is_synced(&self, symbol: &str) -> bool {
        let books = self.books.read().await;
        books.get(symbol).map(|b| b.is_synced()).unwrap_or(false)
    }

    /// 관리 중인 심볼 목록 (정렬됨).
    pub async fn symbols(&self) -> Vec<String> {
        let books = self.books.read().await;
        let mut symbols: Vec<String> = books.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// 심볼 호가창을 제거합니다.
    pub async fn remove(&self, symbol: &str) -> bool {
        self.books.write().await.remove(symbol).is_some()
    }
}
