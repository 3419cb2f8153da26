//! 시장 데이터 구조체.
//!
//! 이 모듈은 시뮬레이션 거래소와 데이터 로더가 공유하는 시장 데이터 타입을 정의합니다:
//! - `Item` - 호가 한 단계 (가격/수량)
//! - `OrderBook` - 틱 단위 호가창 스냅샷
//! - `MatchResult` - 호가 소진 결과
//! - `Record` - 캔들(OHLCV) 레코드
//! - `Trade` - 체결 틱

use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::Side;

/// 호가 한 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// 가격
    pub price: Price,
    /// 잔량
    pub amount: Quantity,
}

impl Item {
    /// 새 호가 단계를 생성합니다.
    pub fn new(price: Price, amount: Quantity) -> Self {
        Self { price, amount }
    }
}

/// 호가 소진 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// 실제 체결된 수량 (깊이가 부족하면 요청 수량보다 작음)
    pub filled: Quantity,
    /// 체결 수량 가중 평균 가격 (체결이 없으면 0)
    pub avg_price: Price,
    /// 소진된 호가 단계 (단계별 체결 수량)
    pub consumed: Vec<Item>,
}

impl MatchResult {
    /// 체결이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.filled.is_zero()
    }
}

/// 최우선 호가부터 바깥쪽으로 호가를 소진합니다.
///
/// `levels`는 체결하는 쪽에서 본 우선순위 순서(매도호가는 오름차순, 매수호가는 내림차순)여야 합니다.
/// `limit`이 주어지면 한도보다 불리한 첫 단계에서 멈춥니다. 입력은 변경하지 않습니다.
pub fn match_levels(
    levels: &[Item],
    size: Quantity,
    side: Side,
    limit: Option<Price>,
) -> MatchResult {
    let mut remaining = size;
    let mut notional = Decimal::ZERO;
    let mut consumed = Vec::new();

    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }
        if let Some(limit) = limit {
            let worse = match side {
                Side::Buy => level.price > limit,
                Side::Sell => level.price < limit,
            };
            if worse {
                break;
            }
        }
        if level.amount <= Decimal::ZERO {
            continue;
        }

        let take = remaining.min(level.amount);
        notional += take * level.price;
        remaining -= take;
        consumed.push(Item::new(level.price, take));
    }

    let filled = size.max(Decimal::ZERO) - remaining.max(Decimal::ZERO);
    let avg_price = if filled > Decimal::ZERO {
        notional / filled
    } else {
        Decimal::ZERO
    };

    MatchResult {
        filled,
        avg_price,
        consumed,
    }
}

/// 틱 단위 호가창 스냅샷.
///
/// `asks`는 가격 오름차순, `bids`는 가격 내림차순으로 정렬되어 있습니다.
/// 엔진에 전달된 이후에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    /// 심볼
    pub symbol: String,
    /// 스냅샷 시각
    pub time: DateTime<Utc>,
    /// 매도 호가 (오름차순)
    pub asks: Vec<Item>,
    /// 매수 호가 (내림차순)
    pub bids: Vec<Item>,
}

impl OrderBook {
    /// 새 호가창을 생성합니다. 양쪽 호가는 정렬 순서로 재배열됩니다.
    pub fn new(
        symbol: impl Into<String>,
        time: DateTime<Utc>,
        mut asks: Vec<Item>,
        mut bids: Vec<Item>,
    ) -> Self {
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        Self {
            symbol: symbol.into(),
            time,
            asks,
            bids,
        }
    }

    /// 최우선 매도호가. 매도 호가가 없으면 0.
    pub fn ask_price(&self) -> Price {
        self.asks.first().map(|i| i.price).unwrap_or(Decimal::ZERO)
    }

    /// 최우선 매수호가. 매수 호가가 없으면 0.
    pub fn bid_price(&self) -> Price {
        self.bids.first().map(|i| i.price).unwrap_or(Decimal::ZERO)
    }

    /// 중간 가격. 한쪽만 있으면 그쪽 최우선 호가를 반환합니다.
    pub fn mid_price(&self) -> Price {
        match (self.asks.first(), self.bids.first()) {
            (Some(ask), Some(bid)) => (ask.price + bid.price) / Decimal::TWO,
            (Some(ask), None) => ask.price,
            (None, Some(bid)) => bid.price,
            (None, None) => Decimal::ZERO,
        }
    }

    /// 주어진 방향의 주문이 소진하는 호가 쪽.
    pub fn levels_for(&self, side: Side) -> &[Item] {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    /// 해당 방향 주문이 소진할 수 있는 전체 잔량.
    pub fn depth(&self, side: Side) -> Quantity {
        self.levels_for(side).iter().map(|i| i.amount).sum()
    }

    /// `size`를 전량 체결했을 때의 가중 평균 가격.
    ///
    /// 깊이가 부족하거나 수량이 0 이하이면 `None`을 반환합니다.
    pub fn avg_fill_price(&self, side: Side, size: Quantity) -> Option<Price> {
        if size <= Decimal::ZERO {
            return None;
        }
        let result = match_levels(self.levels_for(side), size, side, None);
        if result.filled < size {
            return None;
        }
        Some(result.avg_price)
    }

    /// 해당 방향으로 호가를 소진합니다 (부분 체결 허용).
    pub fn match_side(&self, side: Side, size: Quantity, limit: Option<Price>) -> MatchResult {
        match_levels(self.levels_for(side), size, side, limit)
    }

    /// 양쪽을 `depth` 단계로 자른 사본.
    pub fn truncated(&self, depth: usize) -> Self {
        Self {
            symbol: self.symbol.clone(),
            time: self.time,
            asks: self.asks.iter().take(depth).copied().collect(),
            bids: self.bids.iter().take(depth).copied().collect(),
        }
    }

    /// 양쪽 호가가 모두 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }
}

/// 캔들(OHLCV) 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 심볼
    pub symbol: String,
    /// 캔들 시작 시각
    pub time: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량
    pub volume: Quantity,
}

/// 체결 틱.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// 심볼
    pub symbol: String,
    /// 체결 시각
    pub time: DateTime<Utc>,
    /// 테이커 방향
    pub direction: Side,
    /// 체결 가격
    pub price: Price,
    /// 체결 수량
    pub amount: Quantity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn book() -> OrderBook {
        OrderBook::new(
            "BTC-PERP",
            Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap(),
            vec![Item::new(dec!(101), dec!(5)), Item::new(dec!(100), dec!(5))],
            vec![Item::new(dec!(98), dec!(4)), Item::new(dec!(99), dec!(2))],
        )
    }

    #[test]
    fn test_levels_sorted_on_construction() {
        let ob = book();
        assert_eq!(ob.ask_price(), dec!(100));
        assert_eq!(ob.bid_price(), dec!(99));
        assert_eq!(ob.mid_price(), dec!(99.5));
    }

    #[test]
    fn test_empty_side_price_is_zero() {
        let ob = OrderBook::new("X", Utc::now(), vec![], vec![]);
        assert_eq!(ob.ask_price(), Decimal::ZERO);
        assert_eq!(ob.bid_price(), Decimal::ZERO);
        assert!(ob.is_empty());
    }

    #[test]
    fn test_avg_fill_price_vwap() {
        let ob = book();
        // (100*5 + 101*3) / 8
        assert_eq!(ob.avg_fill_price(Side::Buy, dec!(8)), Some(dec!(100.375)));
        assert_eq!(ob.avg_fill_price(Side::Sell, dec!(2)), Some(dec!(99)));
    }

    #[test]
    fn test_avg_fill_price_insufficient_depth() {
        let ob = book();
        assert_eq!(ob.avg_fill_price(Side::Buy, dec!(10.5)), None);
        assert_eq!(ob.avg_fill_price(Side::Buy, Decimal::ZERO), None);
    }

    #[test]
    fn test_match_side_partial() {
        let ob = book();
        let result = ob.match_side(Side::Sell, dec!(10), None);
        assert_eq!(result.filled, dec!(6));
        assert_eq!(result.consumed.len(), 2);
        assert_eq!(result.consumed[1], Item::new(dec!(98), dec!(4)));
    }

    #[test]
    fn test_match_side_respects_limit() {
        let ob = book();
        let result = ob.match_side(Side::Buy, dec!(8), Some(dec!(100)));
        assert_eq!(result.filled, dec!(5));
        assert_eq!(result.avg_price, dec!(100));
    }

    #[test]
    fn test_truncated() {
        let ob = book().truncated(1);
        assert_eq!(ob.asks.len(), 1);
        assert_eq!(ob.bids.len(), 1);
        assert_eq!(ob.bids[0].price, dec!(99));
    }

    fn levels_strategy() -> impl Strategy<Value = Vec<(u32, u32)>> {
        prop::collection::vec((1u32..1000, 1u32..50), 1..10)
    }

    proptest! {
        #[test]
        fn test_avg_fill_price_within_consumed_range(levels in levels_strategy(), size in 1u32..200) {
            let mut asks: Vec<Item> = Vec::new();
            for (price, amount) in levels {
                if asks.iter().all(|i| i.price != Decimal::from(price)) {
                    asks.push(Item::new(Decimal::from(price), Decimal::from(amount)));
                }
            }
            let ob = OrderBook::new("P", Utc::now(), asks, vec![]);
            let size = Decimal::from(size);
            let total = ob.depth(Side::Buy);

            match ob.avg_fill_price(Side::Buy, size) {
                Some(price) => {
                    prop_assert!(size <= total);
                    let consumed = ob.match_side(Side::Buy, size, None).consumed;
                    let best = consumed.first().map(|i| i.price).unwrap_or_default();
                    let worst = consumed.last().map(|i| i.price).unwrap_or_default();
                    prop_assert!(price >= best);
                    prop_assert!(price <= worst);
                }
                None => prop_assert!(size > total),
            }
        }
    }
}
