//! 주문 타입 및 관리.
//!
//! 이 모듈은 시뮬레이션/실거래 공통 주문 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderType` - 주문 유형 (시장가, 지정가, 스톱)
//! - `OrderStatus` - 주문 상태 머신
//! - `PlaceOrderOptions` - 주문 옵션 (스톱 가격, post-only, reduce-only)
//! - `Order` - 주문 엔티티

use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// 포지션 크기 부호 (매수 +1, 매도 -1).
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// 시장가 주문 - 현재 호가를 소진하며 즉시 체결
    Market,
    /// 지정가 주문
    Limit,
    /// 스톱 가격 도달 시 시장가로 전환
    StopMarket,
    /// 스톱 가격 도달 시 지정가로 전환
    StopLimit,
}

impl OrderType {
    /// 스톱 계열 주문인지 확인합니다.
    pub fn is_stop(&self) -> bool {
        matches!(self, OrderType::StopMarket | OrderType::StopLimit)
    }

    /// 지정 가격이 필요한 주문인지 확인합니다.
    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::StopMarket => write!(f, "STOP_MARKET"),
            OrderType::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// 주문 상태.
///
/// `Created → {Rejected | New}`, `New → {PartiallyFilled, Filled, Cancelled}`,
/// `PartiallyFilled → {Filled, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// 생성됨 (아직 매칭 전)
    Created,
    /// 접수됨 (대기 중)
    New,
    /// 부분 체결됨
    PartiallyFilled,
    /// 전량 체결됨
    Filled,
    /// 취소됨
    Cancelled,
    /// 거부됨
    Rejected,
}

impl OrderStatus {
    /// 아직 체결/취소 가능한 상태인지 확인합니다.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Created | OrderStatus::New | OrderStatus::PartiallyFilled
        )
    }

    /// 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        !self.is_open()
    }

    /// 상태 전이가 허용되는지 확인합니다.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Created, New)
                | (Created, Rejected)
                | (Created, PartiallyFilled)
                | (Created, Filled)
                | (Created, Cancelled)
                | (New, Rejected)
                | (New, PartiallyFilled)
                | (New, Filled)
                | (New, Cancelled)
                | (PartiallyFilled, PartiallyFilled)
                | (PartiallyFilled, Filled)
                | (PartiallyFilled, Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// 스톱 주문의 트리거 기준 가격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    /// 최종 체결가
    Last,
    /// 마크 가격
    Mark,
    /// 인덱스 가격
    Index,
}

/// 주문 옵션.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderOptions {
    /// 스톱 가격
    pub stop_px: Option<Price>,
    /// 메이커 전용 (즉시 체결되면 거부)
    pub post_only: bool,
    /// 포지션 축소 전용
    pub reduce_only: bool,
    /// 트리거 가격 유형
    pub price_type: Option<PriceType>,
}

impl PlaceOrderOptions {
    /// 빈 옵션을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스톱 가격을 설정합니다.
    pub fn with_stop_px(mut self, stop_px: Price) -> Self {
        self.stop_px = Some(stop_px);
        self
    }

    /// post-only를 설정합니다.
    pub fn post_only(mut self) -> Self {
        self.post_only = true;
        self
    }

    /// reduce-only를 설정합니다.
    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    /// 트리거 가격 유형을 설정합니다.
    pub fn with_price_type(mut self, price_type: PriceType) -> Self {
        self.price_type = Some(price_type);
        self
    }
}

/// 주문 엔티티.
///
/// 주문을 생성한 엔진만 변경합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// 주문 ID
    pub id: String,
    /// 심볼
    pub symbol: String,
    /// 생성 시각 (시뮬레이션 시각)
    pub time: DateTime<Utc>,
    /// 지정 가격 (시장가는 0)
    pub price: Price,
    /// 스톱 가격
    pub stop_px: Option<Price>,
    /// 주문 수량
    pub amount: Quantity,
    /// 평균 체결 가격
    pub avg_price: Price,
    /// 체결된 수량
    pub filled_amount: Quantity,
    /// 주문 방향
    pub direction: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 메이커 전용
    pub post_only: bool,
    /// 포지션 축소 전용
    pub reduce_only: bool,
    /// 트리거 가격 유형
    #[serde(default)]
    pub price_type: Option<PriceType>,
    /// 스톱 가격 도달 여부
    #[serde(default)]
    pub triggered: bool,
    /// 누적 수수료
    pub commission: Decimal,
    /// 누적 실현 손익
    pub pnl: Decimal,
    /// 마지막 변경 시각
    pub update_time: DateTime<Utc>,
    /// 주문 상태
    pub status: OrderStatus,
}

impl Order {
    /// `Created` 상태의 새 주문을 생성합니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        time: DateTime<Utc>,
        direction: Side,
        order_type: OrderType,
        price: Price,
        amount: Quantity,
        opts: &PlaceOrderOptions,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            time,
            price,
            stop_px: opts.stop_px,
            amount,
            avg_price: Decimal::ZERO,
            filled_amount: Decimal::ZERO,
            direction,
            order_type,
            post_only: opts.post_only,
            reduce_only: opts.reduce_only,
            price_type: opts.price_type,
            triggered: false,
            commission: Decimal::ZERO,
            pnl: Decimal::ZERO,
            update_time: time,
            status: OrderStatus::Created,
        }
    }

    /// 아직 열려 있는 주문인지 확인합니다.
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// 미체결 수량.
    pub fn remaining(&self) -> Quantity {
        (self.amount - self.filled_amount).max(Decimal::ZERO)
    }

    /// 체결을 반영합니다. 평균 체결가를 누적 가중 평균으로 갱신하고 상태를 전이합니다.
    pub fn apply_fill(&mut self, size: Quantity, price: Price, time: DateTime<Utc>) {
        if size <= Decimal::ZERO {
            return;
        }
        let filled = self.filled_amount + size;
        self.avg_price = (self.avg_price * self.filled_amount + price * size) / filled;
        self.filled_amount = filled;
        self.update_time = time;
        self.status = if self.filled_amount >= self.amount {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// 허용되는 경우에만 상태를 전이합니다.
    pub fn transition(&mut self, next: OrderStatus, time: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.update_time = time;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limit_order() -> Order {
        Order::new(
            "1",
            "BTC-PERP",
            Utc::now(),
            Side::Buy,
            OrderType::Limit,
            dec!(100),
            dec!(10),
            &PlaceOrderOptions::new().post_only(),
        )
    }

    #[test]
    fn test_status_open_and_final() {
        assert!(OrderStatus::Created.is_open());
        assert!(OrderStatus::New.is_open());
        assert!(OrderStatus::PartiallyFilled.is_open());
        assert!(OrderStatus::Filled.is_final());
        assert!(OrderStatus::Cancelled.is_final());
        assert!(OrderStatus::Rejected.is_final());
    }

    #[test]
    fn test_terminal_states_do_not_transition() {
        assert!(!OrderStatus::Filled.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Rejected.can_transition_to(OrderStatus::New));
        assert!(!OrderStatus::PartiallyFilled.can_transition_to(OrderStatus::Rejected));
    }

    #[test]
    fn test_apply_fill_partial_then_full() {
        let mut order = limit_order();
        order.transition(OrderStatus::New, Utc::now());

        order.apply_fill(dec!(4), dec!(100), Utc::now());
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining(), dec!(6));

        order.apply_fill(dec!(6), dec!(105), Utc::now());
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.avg_price, dec!(103));
        assert!(!order.is_open());
    }

    #[test]
    fn test_options_builder() {
        let opts = PlaceOrderOptions::new()
            .with_stop_px(dec!(95))
            .reduce_only()
            .with_price_type(PriceType::Mark);
        assert_eq!(opts.stop_px, Some(dec!(95)));
        assert!(opts.reduce_only);
        assert!(!opts.post_only);

        let order = limit_order();
        assert!(order.post_only);
        assert_eq!(order.status, OrderStatus::Created);
    }
}
