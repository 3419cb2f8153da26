//! 주문 ID 생성기.
//!
//! 백테스트 실행마다 한 번 생성되어 모든 시뮬레이션 거래소에 주입됩니다.
//! 시작 시각을 기준값으로 사용하므로 같은 입력이면 같은 ID 순서가 재현됩니다.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// 순서가 보장되는 주문 ID 생성기.
///
/// ID는 `<기준 밀리초 13자리><일련번호 8자리>` 형식이며, 사전순 비교가 생성 순서와 일치합니다.
#[derive(Debug)]
pub struct IdGenerator {
    base: i64,
    seq: AtomicU64,
}

impl IdGenerator {
    /// 실행 시작 시각으로 생성기를 만듭니다.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            base: start.timestamp_millis().max(0),
            seq: AtomicU64::new(0),
        }
    }

    /// 다음 ID를 발급합니다.
    pub fn next_id(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{:013}{:08}", self.base, seq)
    }

    /// 지금까지 발급한 ID 수.
    pub fn issued(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }
}
