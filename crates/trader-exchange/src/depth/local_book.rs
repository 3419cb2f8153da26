//! 단일 심볼 로컬 호가창.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use trader_core::{Item, OrderBook};

use super::message::{BookSide, DeltaAction, DepthMessage};
use crate::error::DepthBookError;

/// 증분 메시지로 유지되는 단일 심볼 호가창.
///
/// 가격을 키로 하는 정렬 맵을 사용하므로 최우선 k단계를 O(k)로 읽습니다.
#[derive(Debug, Clone)]
pub struct LocalOrderBook {
    symbol: String,
    asks: BTreeMap<Decimal, Decimal>,
    bids: BTreeMap<Decimal, Decimal>,
    change_id: Option<u64>,
    time: Option<DateTime<Utc>>,
    synced: bool,
}

impl LocalOrderBook {
    /// 빈(미동기화) 호가창을 생성합니다.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            asks: BTreeMap::new(),
            bids: BTreeMap::new(),
            change_id: None,
            time: None,
            synced: false,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// 마지막으로 적용한 버전.
    pub fn change_id(&self) -> Option<u64> {
        self.change_id
    }

    /// 스냅샷 이후 증분이 빠짐없이 적용되었는지 확인합니다.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// 메시지를 적용합니다.
    ///
    /// 스냅샷은 기존 상태를 무조건 대체합니다. 증분은 직전 버전이 일치해야 하며,
    /// 불일치나 없는 가격 삭제는 `Desync`로 보고되고 다음 스냅샷 전까지 호가창을 잠급니다.
    pub fn update(&mut self, msg: &DepthMessage) -> Result<(), DepthBookError> {
        // 기준 버전이 없는 메시지는 전체 목록으로 취급
        if msg.is_snapshot() || msg.prev_change_id.is_none() {
            self.rebuild(msg);
            return Ok(());
        }

        if !self.synced {
            return Err(DepthBookError::NotSynced(self.symbol.clone()));
        }
        if msg.prev_change_id != self.change_id {
            return Err(self.desync(format!(
                "stale base: expected {:?}, got {:?}",
                self.change_id, msg.prev_change_id
            )));
        }

        for entry in &msg.entries {
            let levels = match entry.side {
                BookSide::Ask => &mut self.asks,
                BookSide::Bid => &mut self.bids,
            };
            match entry.action {
                DeltaAction::New | DeltaAction::Change => {
                    if entry.size.is_zero() {
                        levels.remove(&entry.price);
                    } else {
                        levels.insert(entry.price, entry.size);
                    }
                }
                DeltaAction::Delete => {
                    if levels.remove(&entry.price).is_none() {
                        let price = entry.price;
                        return Err(self.desync(format!("delete of missing price {}", price)));
                    }
                }
            }
        }

        self.change_id = Some(msg.change_id);
        self.time = Some(msg.time);
        Ok(())
    }

    fn rebuild(&mut self, msg: &DepthMessage) {
        self.asks.clear();
        self.bids.clear();
        for entry in &msg.entries {
            if entry.action == DeltaAction::Delete || entry.size <= Decimal::ZERO {
                continue;
            }
            match entry.side {
                BookSide::Ask => self.asks.insert(entry.price, entry.size),
                BookSide::Bid => self.bids.insert(entry.price, entry.size),
            };
        }
        self.change_id = Some(msg.change_id);
        self.time = Some(msg.time);
        self.synced = true;
    }

    fn desync(&mut self, reason: String) -> DepthBookError {
        self.synced = false;
        DepthBookError::Desync {
            symbol: self.symbol.clone(),
            reason,
        }
    }

    /// 양쪽 최우선 `depth`단계를 `OrderBook`으로 복사합니다.
    pub fn snapshot(&self, depth: usize) -> Result<OrderBook, DepthBookError> {
        if !self.synced {
            return Err(DepthBookError::NotSynced(self.symbol.clone()));
        }
        let asks = self
            .asks
            .iter()
            .take(depth)
            .map(|(p, s)| Item::new(*p, *s))
            .collect();
        let bids = self
            .bids
            .iter()
            .rev()
            .take(depth)
            .map(|(p, s)| Item::new(*p, *s))
            .collect();

        Ok(OrderBook {
            symbol: self.symbol.clone(),
            time: self.time.unwrap_or_else(Utc::now),
            asks,
            bids,
        })
    }

    /// 한쪽 단계 수.
    pub fn level_count(&self, side: BookSide) -> usize {
        match side {
            BookSide::Ask => self.asks.len(),
            BookSide::Bid => self.bids.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::message::DepthEntry;
    use rust_decimal_macros::dec;

    fn seeded() -> LocalOrderBook {
        let mut book = LocalOrderBook::new("BTC-PERP");
        let msg = DepthMessage::snapshot(
            "BTC-PERP",
            Utc::now(),
            10,
            &[(dec!(101), dec!(1)), (dec!(100.5), dec!(2)), (dec!(102), dec!(3))],
            &[(dec!(100), dec!(4)), (dec!(99), dec!(5))],
        );
        book.update(&msg).unwrap();
        book
    }

    #[test]
    fn test_snapshot_orders_levels() {
        let ob = seeded().snapshot(2).unwrap();
        assert_eq!(ob.asks, vec![Item::new(dec!(100.5), dec!(2)), Item::new(dec!(101), dec!(1))]);
        assert_eq!(ob.bids[0], Item::new(dec!(100), dec!(4)));
        assert_eq!(ob.bids.len(), 2);
    }

    #[test]
    fn test_change_upserts_and_zero_deletes() {
        let mut book = seeded();
        let msg = DepthMessage::change(
            "BTC-PERP",
            Utc::now(),
            10,
            11,
            vec![
                DepthEntry::new(BookSide::Bid, DeltaAction::Change, dec!(100.25), dec!(7)),
                DepthEntry::new(BookSide::Ask, DeltaAction::Change, dec!(100.5), dec!(0)),
                DepthEntry::new(BookSide::Ask, DeltaAction::New, dec!(101), dec!(9)),
            ],
        );
        book.update(&msg).unwrap();

        let ob = book.snapshot(10).unwrap();
        assert_eq!(ob.bid_price(), dec!(100.25));
        assert_eq!(ob.ask_price(), dec!(101));
        assert_eq!(ob.asks[0].amount, dec!(9));
        assert_eq!(book.change_id(), Some(11));
    }

    #[test]
    fn test_stale_base_desyncs() {
        let mut book = seeded();
        let msg = DepthMessage::change("BTC-PERP", Utc::now(), 8, 9, vec![]);
        assert!(matches!(book.update(&msg), Err(DepthBookError::Desync { .. })));
        assert!(!book.is_synced());
        assert!(book.snapshot(5).is_err());

        // 동기화 전 증분은 거부
        let next = DepthMessage::change("BTC-PERP", Utc::now(), 10, 11, vec![]);
        assert!(matches!(book.update(&next), Err(DepthBookError::NotSynced(_))));
    }

    #[test]
    fn test_delete_missing_price_desyncs_until_snapshot() {
        let mut book = seeded();
        let msg = DepthMessage::change(
            "BTC-PERP",
            Utc::now(),
            10,
            11,
            vec![DepthEntry::new(BookSide::Ask, DeltaAction::Delete, dec!(150), dec!(0))],
        );
        assert!(book.update(&msg).is_err());
        assert!(!book.is_synced());

        let fresh = DepthMessage::snapshot("BTC-PERP", Utc::now(), 20, &[(dec!(105), dec!(1))], &[]);
        book.update(&fresh).unwrap();
        assert!(book.is_synced());
        assert_eq!(book.snapshot(1).unwrap().ask_price(), dec!(105));
        assert_eq!(book.level_count(BookSide::Bid), 0);
    }
}
