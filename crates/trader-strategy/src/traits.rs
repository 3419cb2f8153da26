//! Strategy trait 정의.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trader_exchange::Exchange;

use crate::error::StrategyResult;

/// 실행 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    /// 과거 데이터 재생
    #[default]
    Backtest,
    /// 실시간 데이터, 시뮬레이션 체결
    Paper,
    /// 실거래
    Live,
}

/// 전략 콜백에 전달되는 실행 컨텍스트.
///
/// 전략은 `Exchange` 핸들만 보므로 실거래와 시뮬레이션에서 같은 코드로 동작합니다.
#[derive(Clone)]
pub struct StrategyContext {
    pub mode: TradeMode,
    pub exchanges: Vec<Arc<dyn Exchange>>,
}

impl StrategyContext {
    pub fn new(mode: TradeMode, exchanges: Vec<Arc<dyn Exchange>>) -> Self {
        Self { mode, exchanges }
    }

    /// 이름으로 거래소를 찾습니다.
    pub fn exchange(&self, name: &str) -> Option<&Arc<dyn Exchange>> {
        self.exchanges.iter().find(|e| e.name() == name)
    }
}

impl std::fmt::Debug for StrategyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.exchanges.iter().map(|e| e.name()).collect();
        f.debug_struct("StrategyContext")
            .field("mode", &self.mode)
            .field("exchanges", &names)
            .finish()
    }
}

/// 트레이딩 전략 구현을 위한 Strategy trait.
///
/// 드라이버는 `on_init` → 틱마다 `on_tick` → `on_exit` 순서로 호출합니다.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// 전략 이름 반환.
    fn name(&self) -> &str;

    /// 실행 시작 시 한 번 호출.
    async fn on_init(&mut self, ctx: &StrategyContext) -> StrategyResult<()>;

    /// 틱마다 호출. 주문은 `ctx.exchanges`를 통해 냅니다.
    async fn on_tick(&mut self, ctx: &StrategyContext) -> StrategyResult<()>;

    /// 실행 종료 시 한 번 호출.
    async fn on_exit(&mut self, ctx: &StrategyContext) -> StrategyResult<()>;

    /// 현재 전략 상태를 JSON으로 반환 (리포트용).
    fn get_state(&self) -> Value {
        Value::Null
    }
}
