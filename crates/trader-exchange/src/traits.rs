//! 거래소 trait 정의.
//!
//! 전략은 `Exchange`만 사용하므로 실거래 어댑터와 시뮬레이션 거래소를 바꿔 끼울 수 있습니다.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use trader_core::{
    Balance, Order, OrderBook, OrderType, PlaceOrderOptions, Position, Price, Quantity, Record,
    Side, Timeframe, Trade,
};

use crate::error::ExchangeResult;

/// 통합 거래소 인터페이스.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    // === 계좌 ===

    /// 통화별 잔고 조회.
    async fn get_balance(&self, currency: &str) -> ExchangeResult<Balance>;

    /// 심볼의 포지션 조회 (크기 0인 포지션 제외).
    async fn get_positions(&self, symbol: &str) -> ExchangeResult<Vec<Position>>;

    // === 시장 데이터 ===

    /// 호가창 조회 (`depth`단계까지).
    async fn get_order_book(&self, symbol: &str, depth: usize) -> ExchangeResult<OrderBook>;

    /// 캔들 레코드 조회.
    async fn get_records(
        &self,
        symbol: &str,
        period: Timeframe,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> ExchangeResult<Vec<Record>>;

    // === 주문 ===

    /// 주문 제출.
    #[allow(clippy::too_many_arguments)]
    async fn place_order(
        &self,
        symbol: &str,
        direction: Side,
        order_type: OrderType,
        price: Price,
        size: Quantity,
        opts: PlaceOrderOptions,
    ) -> ExchangeResult<Order>;

    /// 미체결 주문 조회.
    async fn get_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>>;

    /// 주문 조회.
    async fn get_order(&self, symbol: &str, id: &str) -> ExchangeResult<Order>;

    /// 주문 취소.
    async fn cancel_order(&self, symbol: &str, id: &str) -> ExchangeResult<Order>;

    /// 심볼의 모든 미체결 주문 취소. 취소된 주문을 반환합니다.
    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>>;

    /// 주문 정정 (가격/수량).
    async fn amend_order(
        &self,
        symbol: &str,
        id: &str,
        price: Option<Price>,
        size: Option<Quantity>,
    ) -> ExchangeResult<Order>;

    // === 구독 ===

    /// 체결 틱 구독.
    async fn subscribe_trades(&self, symbol: &str) -> ExchangeResult<mpsc::Receiver<Trade>>;

    /// 호가창 스냅샷 구독.
    async fn subscribe_level2_snapshots(
        &self,
        symbol: &str,
    ) -> ExchangeResult<mpsc::Receiver<OrderBook>>;

    /// 주문 변경 구독.
    async fn subscribe_orders(&self, symbol: &str) -> ExchangeResult<mpsc::Receiver<Order>>;

    /// 포지션 변경 구독.
    async fn subscribe_positions(&self, symbol: &str) -> ExchangeResult<mpsc::Receiver<Position>>;
}

/// 백테스트 드라이버가 사용하는 시뮬레이션 전용 확장.
#[async_trait]
pub trait SimulatedExchangeExt: Exchange {
    /// 대기 주문을 현재 스냅샷에 다시 매칭합니다. 틱마다 한 번 호출됩니다.
    async fn run_event_loop_once(&self) -> ExchangeResult<()>;

    /// 계정 통화 기준 잔고/평가 자산.
    async fn account_balance(&self) -> ExchangeResult<Balance>;

    /// 현재 스냅샷.
    async fn current_order_book(&self) -> Option<OrderBook>;

    /// 지금까지 접수된 주문 수.
    async fn order_count(&self) -> usize;

    /// 전략에 넘길 `Exchange` 핸들.
    fn as_exchange(self: Arc<Self>) -> Arc<dyn Exchange>;
}
