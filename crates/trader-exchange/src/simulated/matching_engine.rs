//! 시뮬레이션 거래소를 위한 주문 매칭 엔진.
//!
//! 엔진은 동기 코드이며 호출마다 현재 호가창 스냅샷을 인자로 받습니다.
//! 주문/체결 이벤트는 내부 버퍼에 쌓이고, 래퍼가 `drain_events`로 꺼내 로그와 구독자에게 전달합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use trader_core::{
    Balance, FillModel, IdGenerator, Order, OrderBook, OrderStatus, OrderType, PlaceOrderOptions,
    Position, PositionMode, Price, Quantity, Side, SimulatedExchangeConfig,
};

use super::convention::{convention_for, ContractConvention};
use crate::error::{ExchangeError, ExchangeResult};

/// 체결 유동성 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liquidity {
    /// 대기 주문이 나중에 체결됨
    Maker,
    /// 즉시 체결됨
    Taker,
}

/// 단일 체결 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMatch {
    /// 주문 ID
    pub order_id: String,
    /// 유동성 구분
    pub liquidity: Liquidity,
    /// 체결 수량
    pub filled_quantity: Quantity,
    /// 체결 가격 (깊이 소진 시 가중 평균)
    pub fill_price: Price,
    /// 이번 체결의 수수료
    pub commission: Decimal,
    /// 이번 체결로 실현된 손익
    pub pnl: Decimal,
    /// 체결 시각
    pub timestamp: DateTime<Utc>,
}

/// 엔진 이벤트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineEventKind {
    /// 주문 접수/취소/정정/거부
    Order,
    /// 체결
    Deal,
}

impl EngineEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineEventKind::Order => "order",
            EngineEventKind::Deal => "deal",
        }
    }
}

/// 엔진이 기록한 이벤트.
#[derive(Debug, Clone)]
pub struct EngineEvent {
    pub kind: EngineEventKind,
    /// 이벤트 시점의 주문 사본
    pub order: Order,
    /// 체결 이벤트일 때의 체결 정보
    pub deal: Option<OrderMatch>,
    /// 이벤트 시점의 포지션 (크기 0 제외)
    pub positions: Vec<Position>,
    /// 이벤트 시점의 잔고
    pub balance: Balance,
    pub msg: String,
}

/// 포지션 슬롯.
///
/// 단방향 모드는 순포지션 하나, 양방향 모드는 롱(0)/숏(1) 두 슬롯을 가집니다.
#[derive(Debug, Clone)]
enum PositionSlots {
    OneWay(Position),
    Hedged([Position; 2]),
}

const LONG_SLOT: usize = 0;
const SHORT_SLOT: usize = 1;

impl PositionSlots {
    fn new(mode: PositionMode, symbol: &str, time: DateTime<Utc>) -> Self {
        match mode {
            PositionMode::OneWay => PositionSlots::OneWay(Position::flat(symbol, time)),
            PositionMode::Hedged => PositionSlots::Hedged([
                Position::flat(symbol, time),
                Position::flat(symbol, time),
            ]),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Position> {
        let slice: &[Position] = match self {
            PositionSlots::OneWay(p) => std::slice::from_ref(p),
            PositionSlots::Hedged(slots) => &slots[..],
        };
        slice.iter()
    }

    fn open_positions(&self) -> Vec<Position> {
        self.iter().filter(|p| !p.is_flat()).cloned().collect()
    }

    /// 주문이 건드리는 슬롯.
    fn slot_mut(&mut self, direction: Side, reduce_only: bool) -> &mut Position {
        match self {
            PositionSlots::OneWay(p) => p,
            PositionSlots::Hedged(slots) => &mut slots[hedged_slot(direction, reduce_only)],
        }
    }

    fn slot(&self, direction: Side, reduce_only: bool) -> &Position {
        match self {
            PositionSlots::OneWay(p) => p,
            PositionSlots::Hedged(slots) => &slots[hedged_slot(direction, reduce_only)],
        }
    }
}

/// 양방향 모드 슬롯 선택: 일반 매수/reduce-only 매도는 롱, 일반 매도/reduce-only 매수는 숏.
fn hedged_slot(direction: Side, reduce_only: bool) -> usize {
    match (direction, reduce_only) {
        (Side::Buy, false) | (Side::Sell, true) => LONG_SLOT,
        (Side::Sell, false) | (Side::Buy, true) => SHORT_SLOT,
    }
}

/// 부호 있는 수량 `delta`를 `price`에 포지션에 반영하고 실현 손익을 반환합니다.
///
/// 반대 방향 체결은 기존 포지션을 먼저 청산하고, 남는 수량은 체결가로 새로 진입합니다.
pub(crate) fn apply_position_delta(
    convention: &dyn ContractConvention,
    position: &mut Position,
    delta: Quantity,
    price: Price,
    time: DateTime<Utc>,
) -> Decimal {
    if delta.is_zero() {
        return Decimal::ZERO;
    }

    if position.is_flat() {
        position.size = delta;
        position.avg_price = price;
        position.open_price = price;
        position.open_time = time;
        return Decimal::ZERO;
    }

    let old_abs = position.abs_size();
    let same_sign = (position.size > Decimal::ZERO) == (delta > Decimal::ZERO);
    if same_sign {
        position.avg_price = convention.avg_price(old_abs, position.avg_price, delta.abs(), price);
        position.size += delta;
        return Decimal::ZERO;
    }

    // 반대 방향: 청산
    let Some(side) = position.side() else {
        return Decimal::ZERO;
    };
    let remaining = delta.abs() - old_abs;
    if remaining > Decimal::ZERO {
        let pnl = convention.pnl(side, old_abs, position.avg_price, price);
        position.size = if delta > Decimal::ZERO { remaining } else { -remaining };
        position.avg_price = price;
        position.open_price = price;
        position.open_time = time;
        pnl
    } else if remaining.is_zero() {
        let pnl = convention.pnl(side, old_abs, position.avg_price, price);
        position.size = Decimal::ZERO;
        position.avg_price = Decimal::ZERO;
        position.open_price = Decimal::ZERO;
        pnl
    } else {
        let pnl = convention.pnl(side, delta.abs(), position.avg_price, price);
        position.size += delta;
        pnl
    }
}

/// 다음 처리 단계.
enum Step {
    /// 체결 수량/가격/유동성
    Fill(Quantity, Price, Liquidity),
    /// 대기 유지
    Rest,
    /// 거부 (사유)
    Reject(String),
}

/// 시뮬레이션 거래소를 위한 주문 매칭 엔진.
pub struct MatchingEngine {
    config: SimulatedExchangeConfig,
    convention: Box<dyn ContractConvention>,
    id_gen: Arc<IdGenerator>,
    /// 가용 잔고 (수수료 차감, 실현 손익 반영)
    balance: Decimal,
    /// ID별 전체 주문
    orders: BTreeMap<String, Order>,
    /// 미체결 주문 ID (ID 순서 = 생성 순서)
    open_orders: BTreeSet<String>,
    /// 종료된 주문 ID (종료 순서)
    history_orders: Vec<String>,
    positions: PositionSlots,
    events: Vec<EngineEvent>,
}

impl MatchingEngine {
    /// 새로운 매칭 엔진을 생성합니다.
    pub fn new(config: SimulatedExchangeConfig, id_gen: Arc<IdGenerator>) -> ExchangeResult<Self> {
        config.validate()?;
        let convention = convention_for(config.contract);
        let positions =
            PositionSlots::new(config.position_mode, &config.symbol, DateTime::<Utc>::default());
        Ok(Self {
            balance: config.initial_balance,
            convention,
            id_gen,
            orders: BTreeMap::new(),
            open_orders: BTreeSet::new(),
            history_orders: Vec::new(),
            positions,
            events: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &SimulatedExchangeConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    // ==================== 주문 ====================

    /// 주문을 제출하고 현재 스냅샷에 즉시 매칭을 시도합니다.
    ///
    /// 검증 실패는 `Err`로 반환되며 상태와 ID를 소비하지 않습니다.
    /// 포지션 한도 초과나 깊이 부족은 `Rejected` 주문으로 `Ok`를 반환합니다.
    #[allow(clippy::too_many_arguments)]
    pub fn place_order(
        &mut self,
        book: &OrderBook,
        symbol: &str,
        direction: Side,
        order_type: OrderType,
        price: Price,
        size: Quantity,
        opts: &PlaceOrderOptions,
    ) -> ExchangeResult<Order> {
        self.check_symbol(symbol)?;
        self.check_book(book)?;
        self.validate_size(size)?;

        if order_type.requires_price() && price <= Decimal::ZERO {
            return Err(ExchangeError::InvalidPrice(format!(
                "{:?} order requires a positive price, got {}",
                order_type, price
            )));
        }
        if order_type.is_stop() {
            match opts.stop_px {
                Some(stop) if stop > Decimal::ZERO => {}
                Some(stop) => {
                    return Err(ExchangeError::InvalidPrice(format!(
                        "stop price must be positive, got {}",
                        stop
                    )))
                }
                None => {
                    return Err(ExchangeError::InvalidPrice(format!(
                        "{:?} order requires stop_px",
                        order_type
                    )))
                }
            }
        }
        if opts.reduce_only {
            self.check_reduce_only(direction, size)?;
        }
        if !opts.reduce_only {
            self.check_spot_holdings(direction, size)?;
        }

        let id = self.id_gen.next_id();
        let mut order = Order::new(
            id,
            symbol,
            book.time,
            direction,
            order_type,
            price,
            size,
            opts,
        );

        debug!(
            order_id = %order.id,
            symbol = %symbol,
            direction = ?direction,
            order_type = ?order_type,
            %price,
            %size,
            "주문 접수"
        );

        order.transition(OrderStatus::New, book.time);
        self.push_event(EngineEventKind::Order, &order, None, book, "order placed");
        self.match_order(&mut order, book, true);
        self.store(order.clone());
        Ok(order)
    }

    /// 심볼의 미체결 주문 (ID 순).
    pub fn open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        self.check_symbol(symbol)?;
        Ok(self
            .open_orders
            .iter()
            .filter_map(|id| self.orders.get(id))
            .cloned()
            .collect())
    }

    /// 주문 조회.
    pub fn get_order(&self, symbol: &str, id: &str) -> ExchangeResult<Order> {
        self.check_symbol(symbol)?;
        self.orders
            .get(id)
            .cloned()
            .ok_or_else(|| ExchangeError::OrderNotFound(id.to_string()))
    }

    /// 종료된 주문 (종료 순).
    pub fn history_orders(&self) -> Vec<Order> {
        self.history_orders
            .iter()
            .filter_map(|id| self.orders.get(id))
            .cloned()
            .collect()
    }

    /// 지금까지 접수된 주문 수.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// 주문 취소.
    pub fn cancel_order(&mut self, book: &OrderBook, symbol: &str, id: &str) -> ExchangeResult<Order> {
        self.check_symbol(symbol)?;
        let mut order = self
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| ExchangeError::OrderNotFound(id.to_string()))?;

        if !order.transition(OrderStatus::Cancelled, book.time) {
            return Err(ExchangeError::InvalidOrderStatus {
                id: id.to_string(),
                status: order.status,
            });
        }

        debug!(order_id = %id, "주문 취소");
        self.push_event(EngineEventKind::Order, &order, None, book, "order cancelled");
        self.store(order.clone());
        Ok(order)
    }

    /// 심볼의 모든 미체결 주문 취소.
    pub fn cancel_all_orders(&mut self, book: &OrderBook, symbol: &str) -> ExchangeResult<Vec<Order>> {
        self.check_symbol(symbol)?;
        let ids: Vec<String> = self.open_orders.iter().cloned().collect();
        let mut cancelled = Vec::with_capacity(ids.len());
        for id in ids {
            cancelled.push(self.cancel_order(book, symbol, &id)?);
        }
        Ok(cancelled)
    }

    /// 지정가/스톱 지정가 주문 정정. 정정 후 새 주문처럼 다시 매칭합니다.
    pub fn amend_order(
        &mut self,
        book: &OrderBook,
        symbol: &str,
        id: &str,
        price: Option<Price>,
        size: Option<Quantity>,
    ) -> ExchangeResult<Order> {
        self.check_symbol(symbol)?;
        self.check_book(book)?;
        let mut order = self
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| ExchangeError::OrderNotFound(id.to_string()))?;

        if !order.is_open() {
            return Err(ExchangeError::InvalidOrderStatus {
                id: id.to_string(),
                status: order.status,
            });
        }
        if !matches!(order.order_type, OrderType::Limit | OrderType::StopLimit) {
            return Err(ExchangeError::NotSupported(format!(
                "amend of {:?} order {}",
                order.order_type, id
            )));
        }

        if let Some(price) = price {
            if price <= Decimal::ZERO {
                return Err(ExchangeError::InvalidPrice(format!(
                    "amended price must be positive, got {}",
                    price
                )));
            }
        }
        if let Some(size) = size {
            self.validate_size(size)?;
            if size <= order.filled_amount {
                return Err(ExchangeError::InvalidAmount(format!(
                    "amended size {} must exceed filled amount {}",
                    size, order.filled_amount
                )));
            }
            if order.reduce_only {
                self.check_reduce_only(order.direction, size - order.filled_amount)?;
            }
        }

        if let Some(price) = price {
            order.price = price;
        }
        if let Some(size) = size {
            order.amount = size;
        }
        order.update_time = book.time;

        debug!(order_id = %id, price = ?price, size = ?size, "주문 정정");
        self.push_event(EngineEventKind::Order, &order, None, book, "order amended");
        self.match_order(&mut order, book, true);
        self.store(order.clone());
        Ok(order)
    }

    /// 대기 주문 전체를 현재 스냅샷에 다시 매칭합니다. 발생한 체결 수를 반환합니다.
    pub fn run_event_loop_once(&mut self, book: &OrderBook) -> usize {
        if book.symbol != self.config.symbol {
            trace!(book = %book.symbol, engine = %self.config.symbol, "다른 심볼 스냅샷, 건너뜀");
            return 0;
        }

        let before = self.deal_events();
        let ids: Vec<String> = self.open_orders.iter().cloned().collect();
        for id in ids {
            let Some(mut order) = self.orders.get(&id).cloned() else {
                continue;
            };
            self.match_order(&mut order, book, false);
            self.store(order);
        }
        self.deal_events() - before
    }

    // ==================== 계좌 ====================

    /// 가용 잔고.
    pub fn available(&self) -> Decimal {
        self.balance
    }

    /// 현재 스냅샷 기준 잔고와 평가 자산.
    ///
    /// 롱은 최우선 매수호가, 숏은 최우선 매도호가로 평가하고, 해당 호가가 없으면 중간가를 씁니다.
    pub fn balance_snapshot(&self, book: &OrderBook) -> Balance {
        let unrealized: Decimal = self
            .positions
            .iter()
            .filter(|p| !p.is_flat())
            .filter_map(|p| {
                let side = p.side()?;
                let mut close = p.closing_price(book.bid_price(), book.ask_price());
                if close.is_zero() {
                    close = book.mid_price();
                }
                if close.is_zero() {
                    return None;
                }
                Some(self.convention.pnl(side, p.abs_size(), p.avg_price, close))
            })
            .sum();

        Balance::new(
            self.config.currency.clone(),
            self.balance,
            self.balance + unrealized,
        )
    }

    /// 크기 0이 아닌 포지션.
    pub fn positions(&self, symbol: &str) -> ExchangeResult<Vec<Position>> {
        self.check_symbol(symbol)?;
        Ok(self.positions.open_positions())
    }

    /// 순포지션 크기 (양방향 모드는 롱+숏 합).
    pub fn net_position(&self) -> Quantity {
        self.positions.iter().map(|p| p.size).sum()
    }

    /// 쌓인 이벤트를 꺼냅니다.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // ==================== 매칭 ====================

    /// 열린 주문 하나를 스냅샷에 매칭합니다.
    ///
    /// `immediate`는 접수/정정 시점 매칭이며, 이때 교차하면 테이커입니다.
    fn match_order(&mut self, order: &mut Order, book: &OrderBook, immediate: bool) {
        if !order.is_open() {
            return;
        }

        let mut just_triggered = false;
        if order.order_type.is_stop() && !order.triggered {
            if !self.stop_reached(order, book) {
                return;
            }
            order.triggered = true;
            just_triggered = true;
            debug!(order_id = %order.id, stop_px = ?order.stop_px, "스톱 주문 트리거");
        }

        let taker_pass = immediate || just_triggered;
        let step = match order.order_type {
            OrderType::Market | OrderType::StopMarket => self.market_step(order, book),
            OrderType::Limit | OrderType::StopLimit => self.limit_step(order, book, taker_pass),
        };

        let (size, price, liquidity) = match step {
            Step::Rest => return,
            Step::Reject(reason) => {
                self.reject(order, book, &reason);
                return;
            }
            Step::Fill(size, price, liquidity) => (size, price, liquidity),
        };

        // 대기 주문은 체결 시점 포지션으로 재검증
        if !immediate && !self.still_covered(order, size) {
            order.transition(OrderStatus::Cancelled, book.time);
            self.push_event(
                EngineEventKind::Order,
                order,
                None,
                book,
                "order cancelled: position no longer covers it",
            );
            return;
        }

        if self.would_breach_limit(order, size) {
            if immediate {
                self.reject(order, book, "position limit exceeded");
            } else {
                trace!(order_id = %order.id, "포지션 한도로 대기 유지");
            }
            return;
        }

        self.execute_fill(order, size, price, liquidity, book);

        let is_market = matches!(order.order_type, OrderType::Market | OrderType::StopMarket);
        if is_market && order.is_open() {
            order.transition(OrderStatus::Cancelled, book.time);
            self.push_event(
                EngineEventKind::Order,
                order,
                None,
                book,
                "market order remainder cancelled",
            );
        }
    }

    fn stop_reached(&self, order: &Order, book: &OrderBook) -> bool {
        let Some(stop) = order.stop_px else {
            return false;
        };
        match order.direction {
            Side::Buy => {
                let ask = book.ask_price();
                ask > Decimal::ZERO && ask >= stop
            }
            Side::Sell => {
                let bid = book.bid_price();
                bid > Decimal::ZERO && bid <= stop
            }
        }
    }

    fn market_step(&self, order: &Order, book: &OrderBook) -> Step {
        let remaining = order.remaining();
        match self.config.fill_model {
            FillModel::LimitPrice => match book.avg_fill_price(order.direction, remaining) {
                Some(vwap) => Step::Fill(remaining, vwap, Liquidity::Taker),
                None => Step::Reject(format!(
                    "insufficient depth: need {}, book holds {}",
                    remaining,
                    book.depth(order.direction)
                )),
            },
            FillModel::Depth => {
                let result = book.match_side(order.direction, remaining, None);
                if result.filled.is_zero() {
                    Step::Reject("insufficient depth: book side is empty".to_string())
                } else {
                    Step::Fill(result.filled, result.avg_price, Liquidity::Taker)
                }
            }
        }
    }

    fn limit_step(&self, order: &Order, book: &OrderBook, taker_pass: bool) -> Step {
        let marketable = match order.direction {
            Side::Buy => {
                let ask = book.ask_price();
                ask > Decimal::ZERO && order.price >= ask
            }
            Side::Sell => {
                let bid = book.bid_price();
                bid > Decimal::ZERO && order.price <= bid
            }
        };
        if !marketable {
            return Step::Rest;
        }
        if taker_pass && order.post_only {
            return Step::Reject("post-only order would take liquidity".to_string());
        }

        let liquidity = if taker_pass {
            Liquidity::Taker
        } else {
            Liquidity::Maker
        };
        let remaining = order.remaining();
        match self.config.fill_model {
            FillModel::LimitPrice => Step::Fill(remaining, order.price, liquidity),
            FillModel::Depth => {
                let result = book.match_side(order.direction, remaining, Some(order.price));
                if result.filled.is_zero() {
                    Step::Rest
                } else {
                    Step::Fill(result.filled, result.avg_price, liquidity)
                }
            }
        }
    }

    /// 체결을 반영합니다: 수수료 차감, 포지션 갱신, 실현 손익 반영, 주문 갱신.
    fn execute_fill(
        &mut self,
        order: &mut Order,
        size: Quantity,
        price: Price,
        liquidity: Liquidity,
        book: &OrderBook,
    ) {
        let rate = match liquidity {
            Liquidity::Maker => self.config.maker_fee_rate,
            Liquidity::Taker => self.config.taker_fee_rate,
        };
        let fee = self.convention.notional(size, price) * rate;
        self.balance -= fee;
        order.commission += fee;

        let pnl = self.update_position(order.direction, order.reduce_only, size, price, book.time);
        self.balance += pnl;
        order.pnl += pnl;
        order.apply_fill(size, price, book.time);

        debug!(
            order_id = %order.id,
            liquidity = ?liquidity,
            %size,
            %price,
            %fee,
            %pnl,
            status = %order.status,
            "체결"
        );

        let deal = OrderMatch {
            order_id: order.id.clone(),
            liquidity,
            filled_quantity: size,
            fill_price: price,
            commission: fee,
            pnl,
            timestamp: book.time,
        };
        self.push_event(EngineEventKind::Deal, order, Some(deal), book, "order filled");
    }

    fn update_position(
        &mut self,
        direction: Side,
        reduce_only: bool,
        size: Quantity,
        price: Price,
        time: DateTime<Utc>,
    ) -> Decimal {
        let hedged = matches!(self.positions, PositionSlots::Hedged(_));
        let slot = self.positions.slot_mut(direction, reduce_only);
        let mut delta = size * direction.sign();
        if hedged && reduce_only {
            // 슬롯은 뒤집히지 않음
            delta = direction.sign() * size.min(slot.abs_size());
        }
        apply_position_delta(self.convention.as_ref(), slot, delta, price, time)
    }

    fn reject(&mut self, order: &mut Order, book: &OrderBook, reason: &str) {
        let next = if order.filled_amount > Decimal::ZERO {
            OrderStatus::Cancelled
        } else {
            OrderStatus::Rejected
        };
        order.transition(next, book.time);
        warn!(order_id = %order.id, status = %order.status, reason, "주문 거부");
        self.push_event(EngineEventKind::Order, order, None, book, reason);
    }

    // ==================== 검증 ====================

    fn check_symbol(&self, symbol: &str) -> ExchangeResult<()> {
        if symbol != self.config.symbol {
            return Err(ExchangeError::SymbolNotFound(symbol.to_string()));
        }
        Ok(())
    }

    /// 스냅샷이 이 엔진의 심볼인지 확인합니다.
    fn check_book(&self, book: &OrderBook) -> ExchangeResult<()> {
        if book.symbol != self.config.symbol {
            return Err(ExchangeError::NoMarketData(self.config.symbol.clone()));
        }
        Ok(())
    }

    fn validate_size(&self, size: Quantity) -> ExchangeResult<()> {
        if size.is_zero() {
            return Err(ExchangeError::ZeroSize);
        }
        if size < Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(format!("negative size {}", size)));
        }
        if !self.convention.is_valid_lot(size, self.config.lot_size) {
            return Err(ExchangeError::InvalidLotSize {
                size,
                lot_size: self.config.lot_size,
            });
        }
        Ok(())
    }

    /// reduce-only 주문이 반대 포지션으로 `size`만큼 덮이는지 확인합니다.
    fn reduce_only_covered(&self, direction: Side, size: Quantity) -> bool {
        let position = self.positions.slot(direction, true);
        match direction {
            Side::Sell => position.size >= size,
            Side::Buy => -position.size >= size,
        }
    }

    fn check_reduce_only(&self, direction: Side, size: Quantity) -> ExchangeResult<()> {
        if self.reduce_only_covered(direction, size) {
            return Ok(());
        }
        let position = self.positions.slot(direction, true);
        Err(ExchangeError::InvalidAmount(format!(
            "reduce-only {:?} {} not covered by position {}",
            direction, size, position.size
        )))
    }

    fn spot_holds(&self, direction: Side, size: Quantity) -> bool {
        if self.convention.allows_short() || direction == Side::Buy {
            return true;
        }
        self.net_position() >= size
    }

    fn check_spot_holdings(&self, direction: Side, size: Quantity) -> ExchangeResult<()> {
        if self.spot_holds(direction, size) {
            return Ok(());
        }
        Err(ExchangeError::InvalidAmount(format!(
            "spot sell {} exceeds holdings {}",
            size,
            self.net_position()
        )))
    }

    fn still_covered(&self, order: &Order, size: Quantity) -> bool {
        if order.reduce_only {
            return self.reduce_only_covered(order.direction, size);
        }
        self.spot_holds(order.direction, size)
    }

    /// 체결 후 포지션 크기가 한도를 넘는지 확인합니다.
    fn would_breach_limit(&self, order: &Order, size: Quantity) -> bool {
        let Some(max) = self.config.max_position_size else {
            return false;
        };
        match &self.positions {
            PositionSlots::OneWay(p) => (p.size + size * order.direction.sign()).abs() > max,
            PositionSlots::Hedged(_) => {
                if order.reduce_only {
                    return false;
                }
                let slot = self.positions.slot(order.direction, false);
                slot.abs_size() + size > max
            }
        }
    }

    // ==================== 내부 ====================

    fn store(&mut self, order: Order) {
        let id = order.id.clone();
        if order.is_open() {
            self.open_orders.insert(id.clone());
        } else if self.open_orders.remove(&id) || !self.orders.contains_key(&id) {
            self.history_orders.push(id.clone());
        }
        self.orders.insert(id, order);
    }

    fn push_event(
        &mut self,
        kind: EngineEventKind,
        order: &Order,
        deal: Option<OrderMatch>,
        book: &OrderBook,
        msg: &str,
    ) {
        let event = EngineEvent {
            kind,
            order: order.clone(),
            deal,
            positions: self.positions.open_positions(),
            balance: self.balance_snapshot(book),
            msg: msg.to_string(),
        };
        self.events.push(event);
    }

    fn deal_events(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == EngineEventKind::Deal)
            .count()
    }
}

impl std::fmt::Debug for MatchingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingEngine")
            .field("symbol", &self.config.symbol)
            .field("convention", &self.convention.kind())
            .field("balance", &self.balance)
            .field("open_orders", &self.open_orders.len())
            .field("orders", &self.orders.len())
            .finish()
    }
}
