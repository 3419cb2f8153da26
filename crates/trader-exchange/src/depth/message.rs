//! 깊이 호가창 증분 메시지.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{Price, Quantity};

/// 호가 쪽.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    /// 매도 호가
    Ask,
    /// 매수 호가
    Bid,
}

/// 증분 항목 동작.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaAction {
    /// 새 가격 단계
    New,
    /// 기존 단계 수량 변경
    Change,
    /// 단계 삭제
    Delete,
}

/// 메시지 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthMessageKind {
    /// 전체 스냅샷
    Snapshot,
    /// 증분 변경
    Change,
}

/// 증분 항목 하나.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthEntry {
    pub side: BookSide,
    pub action: DeltaAction,
    pub price: Price,
    pub size: Quantity,
}

impl DepthEntry {
    pub fn new(side: BookSide, action: DeltaAction, price: Price, size: Quantity) -> Self {
        Self {
            side,
            action,
            price,
            size,
        }
    }
}

/// 거래소 깊이 피드 메시지.
///
/// `prev_change_id`가 없는 메시지는 스냅샷으로 취급합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthMessage {
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub kind: DepthMessageKind,
    /// 이 메시지 적용 후의 버전
    pub change_id: u64,
    /// 이 메시지가 기대하는 직전 버전
    #[serde(default)]
    pub prev_change_id: Option<u64>,
    pub entries: Vec<DepthEntry>,
}

impl DepthMessage {
    /// 전체 스냅샷 메시지를 생성합니다.
    pub fn snapshot(
        symbol: impl Into<String>,
        time: DateTime<Utc>,
        change_id: u64,
        asks: &[(Decimal, Decimal)],
        bids: &[(Decimal, Decimal)],
    ) -> Self {
        let entries = asks
            .iter()
            .map(|(p, s)| DepthEntry::new(BookSide::Ask, DeltaAction::New, *p, *s))
            .chain(
                bids.iter()
                    .map(|(p, s)| DepthEntry::new(BookSide::Bid, DeltaAction::New, *p, *s)),
            )
            .collect();
        Self {
            symbol: symbol.into(),
            time,
            kind: DepthMessageKind::Snapshot,
            change_id,
            prev_change_id: None,
            entries,
        }
    }

    /// 증분 메시지를 생성합니다.
    pub fn change(
        symbol: impl Into<String>,
        time: DateTime<Utc>,
        prev_change_id: u64,
        change_id: u64,
        entries: Vec<DepthEntry>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            time,
            kind: DepthMessageKind::Change,
            change_id,
            prev_change_id: Some(prev_change_id),
            entries,
        }
    }

    /// 전체 재구성이 필요한 메시지인지 확인합니다.
    pub fn is_snapshot(&self) -> bool {
        self.kind == DepthMessageKind::Snapshot || self.prev_change_id.is_none()
    }
}
