//! 호가 제시 전략.
//!
//! 최우선 매수/매도 호가에 고정 수량의 post-only 지정가 주문을 제시합니다.
//! 재고가 한도에 도달하면 늘어나는 쪽 호가를 거두고, 반대쪽을 reduce-only로 냅니다.
//! `refresh_ticks` 틱마다 기존 주문을 모두 취소하고 다시 제시합니다.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use trader_core::{OrderType, PlaceOrderOptions, Price, Quantity, Side, StrategyConfig};
use trader_exchange::Exchange;

use crate::error::{StrategyError, StrategyResult};
use crate::traits::{Strategy, StrategyContext};

/// 호가 제시 전략 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoterConfig {
    /// 호가당 주문 수량
    pub order_size: Quantity,
    /// 재고 한도 (절대값)
    pub max_inventory: Quantity,
    /// 재제시 주기 (틱)
    pub refresh_ticks: u64,
}

impl Default for QuoterConfig {
    fn default() -> Self {
        Self {
            order_size: Decimal::from(10),
            max_inventory: Decimal::from(100),
            refresh_ticks: 5,
        }
    }
}

impl From<&StrategyConfig> for QuoterConfig {
    fn from(config: &StrategyConfig) -> Self {
        Self {
            order_size: config.order_size,
            max_inventory: config.max_inventory,
            refresh_ticks: config.refresh_ticks,
        }
    }
}

impl QuoterConfig {
    fn validate(&self) -> StrategyResult<()> {
        if self.order_size <= Decimal::ZERO {
            return Err(StrategyError::Config(format!(
                "order_size는 양수여야 합니다: {}",
                self.order_size
            )));
        }
        if self.max_inventory < Decimal::ZERO {
            return Err(StrategyError::Config(format!(
                "max_inventory는 음수일 수 없습니다: {}",
                self.max_inventory
            )));
        }
        if self.refresh_ticks == 0 {
            return Err(StrategyError::Config(
                "refresh_ticks는 1 이상이어야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

/// 한 방향 호가 계획.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Quote {
    side: Side,
    price: Price,
    size: Quantity,
    reduce_only: bool,
}

/// 호가 제시 전략.
pub struct QuoterStrategy {
    symbol: String,
    config: QuoterConfig,
    /// 처리한 틱 수
    ticks: u64,
    /// 제출한 호가 수
    quotes_placed: u64,
    /// 거부된 호가 수
    quotes_rejected: u64,
    /// 마지막으로 관측한 순포지션 합계
    inventory: Quantity,
}

impl QuoterStrategy {
    /// 새 호가 제시 전략 생성.
    pub fn new(symbol: impl Into<String>, config: QuoterConfig) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            ticks: 0,
            quotes_placed: 0,
            quotes_rejected: 0,
            inventory: Decimal::ZERO,
        }
    }

    /// 재고와 호가로 이번 주기에 낼 주문을 정합니다.
    fn plan_quotes(&self, inventory: Quantity, bid: Price, ask: Price) -> Vec<Quote> {
        let size = self.config.order_size;
        let cap = self.config.max_inventory;
        let mut quotes = Vec::with_capacity(2);

        if bid > Decimal::ZERO {
            if inventory <= -cap && inventory < Decimal::ZERO {
                quotes.push(Quote {
                    side: Side::Buy,
                    price: bid,
                    size: size.min(inventory.abs()),
                    reduce_only: true,
                });
            } else if inventory < cap {
                quotes.push(Quote {
                    side: Side::Buy,
                    price: bid,
                    size,
                    reduce_only: false,
                });
            }
        }

        if ask > Decimal::ZERO {
            if inventory >= cap && inventory > Decimal::ZERO {
                quotes.push(Quote {
                    side: Side::Sell,
                    price: ask,
                    size: size.min(inventory),
                    reduce_only: true,
                });
            } else if inventory > -cap {
                quotes.push(Quote {
                    side: Side::Sell,
                    price: ask,
                    size,
                    reduce_only: false,
                });
            }
        }

        quotes
    }

    async fn requote(&mut self, exchange: &dyn Exchange) -> StrategyResult<()> {
        exchange.cancel_all_orders(&self.symbol).await?;

        let book = exchange.get_order_book(&self.symbol, 1).await?;
        let inventory: Quantity = exchange
            .get_positions(&self.symbol)
            .await?
            .iter()
            .map(|p| p.size)
            .sum();
        self.inventory = inventory;

        for quote in self.plan_quotes(inventory, book.bid_price(), book.ask_price()) {
            let mut opts = PlaceOrderOptions::new().post_only();
            if quote.reduce_only {
                opts = opts.reduce_only();
            }
            match exchange
                .place_order(&self.symbol, quote.side, OrderType::Limit, quote.price, quote.size, opts)
                .await
            {
                Ok(order) => {
                    self.quotes_placed += 1;
                    debug!(
                        exchange = exchange.name(),
                        order_id = %order.id,
                        side = ?quote.side,
                        price = %quote.price,
                        size = %quote.size,
                        status = %order.status,
                        "호가 제시"
                    );
                }
                Err(e) if e.is_validation() => {
                    self.quotes_rejected += 1;
                    warn!(exchange = exchange.name(), error = %e, "호가 검증 실패, 건너뜀");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Strategy for QuoterStrategy {
    fn name(&self) -> &str {
        "quoter"
    }

    async fn on_init(&mut self, ctx: &StrategyContext) -> StrategyResult<()> {
        self.config.validate()?;
        if ctx.exchanges.is_empty() {
            return Err(StrategyError::Config("거래소가 없습니다".to_string()));
        }
        self.ticks = 0;
        info!(
            symbol = %self.symbol,
            mode = ?ctx.mode,
            order_size = %self.config.order_size,
            max_inventory = %self.config.max_inventory,
            "호가 제시 전략 초기화"
        );
        Ok(())
    }

    async fn on_tick(&mut self, ctx: &StrategyContext) -> StrategyResult<()> {
        let tick = self.ticks;
        self.ticks += 1;
        if tick % self.config.refresh_ticks != 0 {
            return Ok(());
        }
        for exchange in &ctx.exchanges {
            self.requote(exchange.as_ref()).await?;
        }
        Ok(())
    }

    async fn on_exit(&mut self, ctx: &StrategyContext) -> StrategyResult<()> {
        for exchange in &ctx.exchanges {
            let cancelled = exchange.cancel_all_orders(&self.symbol).await?;
            debug!(exchange = exchange.name(), count = cancelled.len(), "종료 시 주문 취소");
        }
        info!(
            ticks = self.ticks,
            quotes = self.quotes_placed,
            rejected = self.quotes_rejected,
            "호가 제시 전략 종료"
        );
        Ok(())
    }

    fn get_state(&self) -> Value {
        json!({
            "symbol": self.symbol,
            "ticks": self.ticks,
            "quotes_placed": self.quotes_placed,
            "quotes_rejected": self.quotes_rejected,
            "inventory": self.inventory.to_string(),
        })
    }
}
