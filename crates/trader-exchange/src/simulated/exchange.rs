//! 시뮬레이션 거래소 구현.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, instrument, warn};
use trader_core::{
    Balance, IdGenerator, Order, OrderBook, OrderType, PlaceOrderOptions, Position, Price,
    Quantity, Record, Side, SimulatedExchangeConfig, Timeframe, Trade,
};
use trader_data::SharedCursor;

use super::event_log::{EventLog, EventRecord};
use super::matching_engine::{EngineEvent, EngineEventKind, MatchingEngine};
use super::stream::{EventBroadcaster, DEFAULT_CHANNEL_CAPACITY};
use crate::error::{ExchangeError, ExchangeResult};
use crate::traits::{Exchange, SimulatedExchangeExt};

/// 이벤트 로그에 남기는 호가 단계 수.
const LOG_BOOK_DEPTH: usize = 5;

/// 백테스팅을 위한 시뮬레이션 거래소.
///
/// 공유 데이터 커서의 현재 스냅샷을 시장으로 보고 주문을 매칭합니다.
pub struct SimulatedExchange {
    config: SimulatedExchangeConfig,
    /// 현재 스냅샷을 제공하는 커서
    cursor: SharedCursor,
    /// 매칭 엔진
    engine: RwLock<MatchingEngine>,
    /// 이벤트 로그 (선택)
    event_log: Option<Arc<EventLog>>,
    order_broadcaster: EventBroadcaster<Order>,
    position_broadcaster: EventBroadcaster<Position>,
    book_broadcaster: EventBroadcaster<OrderBook>,
}

impl SimulatedExchange {
    /// 새로운 시뮬레이션 거래소를 생성합니다.
    pub fn new(
        config: SimulatedExchangeConfig,
        cursor: SharedCursor,
        id_gen: Arc<IdGenerator>,
    ) -> ExchangeResult<Self> {
        let engine = MatchingEngine::new(config.clone(), id_gen)?;
        Ok(Self {
            config,
            cursor,
            engine: RwLock::new(engine),
            event_log: None,
            order_broadcaster: EventBroadcaster::new("order"),
            position_broadcaster: EventBroadcaster::new("position"),
            book_broadcaster: EventBroadcaster::new("level2"),
        })
    }

    /// 이벤트 로그를 연결합니다.
    pub fn with_event_log(mut self, event_log: Arc<EventLog>) -> Self {
        self.event_log = Some(event_log);
        self
    }

    pub fn config(&self) -> &SimulatedExchangeConfig {
        &self.config
    }

    /// 종료된 주문 목록.
    pub async fn history_orders(&self) -> Vec<Order> {
        self.engine.read().await.history_orders()
    }

    fn check_symbol(&self, symbol: &str) -> ExchangeResult<()> {
        if symbol != self.config.symbol {
            return Err(ExchangeError::SymbolNotFound(symbol.to_string()));
        }
        Ok(())
    }

    async fn current_book(&self) -> ExchangeResult<OrderBook> {
        self.cursor
            .read()
            .await
            .current()
            .cloned()
            .ok_or_else(|| ExchangeError::NoMarketData(self.config.symbol.clone()))
    }

    /// 엔진 이벤트를 구독자에게 전달하고 로그에 기록합니다.
    ///
    /// 이벤트는 이미 엔진에 반영된 상태이므로 로그 기록 실패는 호출자에게 전파하지 않습니다.
    async fn publish(&self, events: Vec<EngineEvent>, book: &OrderBook) {
        if events.is_empty() {
            return;
        }
        for event in &events {
            self.order_broadcaster.broadcast(event.order.clone()).await;
            if event.kind == EngineEventKind::Deal {
                self.broadcast_positions(event.positions.clone(), book.time).await;
            }
        }

        let Some(log) = &self.event_log else {
            return;
        };
        let logged_book = book.truncated(LOG_BOOK_DEPTH);
        for event in &events {
            let record =
                EventRecord::from_engine_event(&self.config.name, book.time, event, Some(&logged_book));
            if let Err(e) = log.append(&record) {
                error!(
                    exchange = %self.config.name,
                    order_id = %event.order.id,
                    event = event.kind.as_str(),
                    path = %log.path().display(),
                    error = %e,
                    "이벤트 로그 기록 실패"
                );
            }
        }
    }

    /// 포지션 변경 전달. 청산으로 사라진 포지션은 크기 0으로 전달합니다.
    async fn broadcast_positions(&self, positions: Vec<Position>, time: DateTime<Utc>) {
        if positions.is_empty() {
            self.position_broadcaster
                .broadcast(Position::flat(self.config.symbol.clone(), time))
                .await;
            return;
        }
        for position in positions {
            self.position_broadcaster.broadcast(position).await;
        }
    }
}

#[async_trait]
impl Exchange for SimulatedExchange {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_balance(&self, currency: &str) -> ExchangeResult<Balance> {
        if currency != self.config.currency {
            return Err(ExchangeError::AssetNotFound(currency.to_string()));
        }
        self.account_balance().await
    }

    async fn get_positions(&self, symbol: &str) -> ExchangeResult<Vec<Position>> {
        self.engine.read().await.positions(symbol)
    }

    async fn get_order_book(&self, symbol: &str, depth: usize) -> ExchangeResult<OrderBook> {
        self.check_symbol(symbol)?;
        Ok(self.current_book().await?.truncated(depth))
    }

    async fn get_records(
        &self,
        symbol: &str,
        period: Timeframe,
        _from: Option<DateTime<Utc>>,
        _to: Option<DateTime<Utc>>,
        _limit: usize,
    ) -> ExchangeResult<Vec<Record>> {
        Err(ExchangeError::NotSupported(format!(
            "{} records for {} in simulated exchange",
            period, symbol
        )))
    }

    #[instrument(skip(self, opts), fields(exchange = %self.config.name))]
    async fn place_order(
        &self,
        symbol: &str,
        direction: Side,
        order_type: OrderType,
        price: Price,
        size: Quantity,
        opts: PlaceOrderOptions,
    ) -> ExchangeResult<Order> {
        self.check_symbol(symbol)?;
        let book = self.current_book().await?;

        let (order, events) = {
            let mut engine = self.engine.write().await;
            let order = engine.place_order(&book, symbol, direction, order_type, price, size, &opts)?;
            (order, engine.drain_events())
        };
        self.publish(events, &book).await;
        Ok(order)
    }

    async fn get_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        self.engine.read().await.open_orders(symbol)
    }

    async fn get_order(&self, symbol: &str, id: &str) -> ExchangeResult<Order> {
        self.engine.read().await.get_order(symbol, id)
    }

    #[instrument(skip(self), fields(exchange = %self.config.name))]
    async fn cancel_order(&self, symbol: &str, id: &str) -> ExchangeResult<Order> {
        self.check_symbol(symbol)?;
        let book = self.current_book().await?;
        let (order, events) = {
            let mut engine = self.engine.write().await;
            let order = engine.cancel_order(&book, symbol, id)?;
            (order, engine.drain_events())
        };
        self.publish(events, &book).await;
        Ok(order)
    }

    async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        self.check_symbol(symbol)?;
        let book = self.current_book().await?;
        let (orders, events) = {
            let mut engine = self.engine.write().await;
            let orders = engine.cancel_all_orders(&book, symbol)?;
            (orders, engine.drain_events())
        };
        debug!(exchange = %self.config.name, count = orders.len(), "전체 주문 취소");
        self.publish(events, &book).await;
        Ok(orders)
    }

    #[instrument(skip(self), fields(exchange = %self.config.name))]
    async fn amend_order(
        &self,
        symbol: &str,
        id: &str,
        price: Option<Price>,
        size: Option<Quantity>,
    ) -> ExchangeResult<Order> {
        self.check_symbol(symbol)?;
        let book = self.current_book().await?;
        let (order, events) = {
            let mut engine = self.engine.write().await;
            let order = engine.amend_order(&book, symbol, id, price, size)?;
            (order, engine.drain_events())
        };
        self.publish(events, &book).await;
        Ok(order)
    }

    async fn subscribe_trades(&self, symbol: &str) -> ExchangeResult<mpsc::Receiver<Trade>> {
        Err(ExchangeError::NotSupported(format!(
            "trade feed for {} in simulated exchange",
            symbol
        )))
    }

    async fn subscribe_level2_snapshots(
        &self,
        symbol: &str,
    ) -> ExchangeResult<mpsc::Receiver<OrderBook>> {
        self.check_symbol(symbol)?;
        Ok(self.book_broadcaster.subscribe(DEFAULT_CHANNEL_CAPACITY).await)
    }

    async fn subscribe_orders(&self, symbol: &str) -> ExchangeResult<mpsc::Receiver<Order>> {
        self.check_symbol(symbol)?;
        Ok(self.order_broadcaster.subscribe(DEFAULT_CHANNEL_CAPACITY).await)
    }

    async fn subscribe_positions(&self, symbol: &str) -> ExchangeResult<mpsc::Receiver<Position>> {
        self.check_symbol(symbol)?;
        Ok(self.position_broadcaster.subscribe(DEFAULT_CHANNEL_CAPACITY).await)
    }
}

#[async_trait]
impl SimulatedExchangeExt for SimulatedExchange {
    async fn run_event_loop_once(&self) -> ExchangeResult<()> {
        let book = match self.current_book().await {
            Ok(book) => book,
            Err(e) => {
                warn!(exchange = %self.config.name, error = %e, "현재 스냅샷 없음, 매칭 건너뜀");
                return Ok(());
            }
        };

        let events = {
            let mut engine = self.engine.write().await;
            engine.run_event_loop_once(&book);
            engine.drain_events()
        };
        self.publish(events, &book).await;
        self.book_broadcaster.broadcast(book).await;
        Ok(())
    }

    async fn account_balance(&self) -> ExchangeResult<Balance> {
        let book = self.cursor.read().await.current().cloned();
        let engine = self.engine.read().await;
        Ok(match book {
            Some(book) => engine.balance_snapshot(&book),
            None => Balance::new(
                self.config.currency.clone(),
                engine.available(),
                engine.available(),
            ),
        })
    }

    async fn current_order_book(&self) -> Option<OrderBook> {
        self.cursor.read().await.current().cloned()
    }

    async fn order_count(&self) -> usize {
        self.engine.read().await.order_count()
    }

    fn as_exchange(self: Arc<Self>) -> Arc<dyn Exchange> {
        self
    }
}
