//! 백테스팅 엔진
//!
//! 공유 데이터 커서를 한 틱씩 전진시키며 전략과 시뮬레이션 거래소를 구동합니다.
//!
//! # 틱 처리 순서
//!
//! 1. `strategy.on_tick()`
//! 2. 각 거래소의 `run_event_loop_once()` (등록 순서)
//! 3. 틱 통계 기록
//! 4. 모든 커서 전진 (하나라도 소진되면 종료)
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use trader_analytics::backtest::{BacktestConfig, BacktestEngine};
//!
//! let mut engine = BacktestEngine::new(BacktestConfig::new(start, end));
//! engine.add_exchange(exchange.clone(), cursor.clone());
//!
//! let report = engine.run(&mut strategy).await?;
//! println!("{}", report.summary());
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, Instrument};
use trader_core::{backtest_span, BacktestSection};
use trader_data::{DataError, SharedCursor};
use trader_exchange::{ExchangeError, SimulatedExchangeExt};
use trader_strategy::{Strategy, StrategyContext, StrategyError, TradeMode};

use super::report::BacktestReport;
use super::stats::{compute_stats, ExchangeTick, LogItem};

/// 백테스트 오류
#[derive(Debug, Error)]
pub enum BacktestError {
    /// 설정 오류
    #[error("백테스트 설정 오류: {0}")]
    ConfigError(String),

    /// 구간에 데이터가 없음
    #[error("데이터 없음: {0}")]
    NoData(String),

    /// 데이터 오류
    #[error("데이터 오류: {0}")]
    Data(#[from] DataError),

    /// 거래소 오류
    #[error("거래소 오류: {0}")]
    Exchange(#[from] ExchangeError),

    /// 전략 오류
    #[error("전략 실행 오류: {0}")]
    Strategy(#[from] StrategyError),

    /// 결과 저장 오류
    #[error("결과 저장 오류: {0}")]
    Io(#[from] std::io::Error),

    /// 직렬화 오류
    #[error("직렬화 오류: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 백테스트 결과 타입
pub type BacktestResult<T> = Result<T, BacktestError>;

/// 백테스트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// 시작 시각 (포함)
    pub start: DateTime<Utc>,

    /// 종료 시각 (제외)
    pub end: DateTime<Utc>,

    /// 결과 디렉토리. 지정하면 `stats.json`을 저장합니다.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// 최대 틱 수 (디버깅용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<usize>,
}

impl BacktestConfig {
    /// 구간으로 설정을 생성합니다.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            output_dir: None,
            max_ticks: None,
        }
    }

    /// 결과 디렉토리 설정
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// 최대 틱 수 설정
    pub fn with_max_ticks(mut self, max_ticks: usize) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// 설정 검증
    pub fn validate(&self) -> BacktestResult<()> {
        if self.start >= self.end {
            return Err(BacktestError::ConfigError(format!(
                "시작 시각({})이 종료 시각({})보다 앞서야 합니다",
                self.start, self.end
            )));
        }
        if self.max_ticks == Some(0) {
            return Err(BacktestError::ConfigError(
                "max_ticks는 1 이상이어야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&BacktestSection> for BacktestConfig {
    fn from(section: &BacktestSection) -> Self {
        Self::new(section.start, section.end).with_output_dir(section.output_dir.clone())
    }
}

/// 백테스팅 엔진
///
/// 등록된 거래소와 커서를 단일 태스크에서 결정적으로 구동합니다.
/// 여러 거래소가 같은 커서를 공유할 수 있으며, 커서는 한 틱에 한 번만 전진합니다.
pub struct BacktestEngine {
    /// 설정
    config: BacktestConfig,

    /// 시뮬레이션 거래소 (등록 순서 유지)
    exchanges: Vec<Arc<dyn SimulatedExchangeExt>>,

    /// 중복 없는 커서 목록
    cursors: Vec<SharedCursor>,

    /// 틱 기록
    log: Vec<LogItem>,
}

impl BacktestEngine {
    /// 새로운 백테스트 엔진을 생성합니다.
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            exchanges: Vec::new(),
            cursors: Vec::new(),
            log: Vec::new(),
        }
    }

    /// 거래소와 그 거래소가 읽는 커서를 등록합니다.
    pub fn add_exchange(&mut self, exchange: Arc<dyn SimulatedExchangeExt>, cursor: SharedCursor) {
        if !self.cursors.iter().any(|c| Arc::ptr_eq(c, &cursor)) {
            self.cursors.push(cursor);
        }
        self.exchanges.push(exchange);
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// 마지막 실행의 틱 기록.
    pub fn log(&self) -> &[LogItem] {
        &self.log
    }

    /// 백테스트를 실행합니다.
    ///
    /// 결과 디렉토리가 설정되어 있으면 리포트를 저장합니다.
    pub async fn run(&mut self, strategy: &mut dyn Strategy) -> BacktestResult<BacktestReport> {
        self.config.validate()?;
        if self.exchanges.is_empty() {
            return Err(BacktestError::ConfigError(
                "등록된 거래소가 없습니다".to_string(),
            ));
        }

        let span = backtest_span!("backtest", strategy.name());
        let report = self.run_inner(strategy).instrument(span).await?;

        if let Some(dir) = &self.config.output_dir {
            let path = report.save(dir)?;
            info!(path = %path.display(), "백테스트 결과 저장");
        }
        Ok(report)
    }

    async fn run_inner(&mut self, strategy: &mut dyn Strategy) -> BacktestResult<BacktestReport> {
        self.log.clear();

        for cursor in &self.cursors {
            if !cursor.write().await.reset(self.config.start, self.config.end).await? {
                return Err(BacktestError::NoData(format!(
                    "{} ~ {} 구간에 데이터가 없습니다",
                    self.config.start, self.config.end
                )));
            }
        }

        let ctx = StrategyContext::new(
            TradeMode::Backtest,
            self.exchanges.iter().map(|e| e.clone().as_exchange()).collect(),
        );

        info!(
            start = %self.config.start,
            end = %self.config.end,
            exchanges = self.exchanges.len(),
            "백테스트 시작"
        );
        strategy.on_init(&ctx).await?;

        loop {
            strategy.on_tick(&ctx).await?;
            for exchange in &self.exchanges {
                exchange.run_event_loop_once().await?;
            }

            let item = self.snapshot().await?;
            self.log.push(item);

            if let Some(max_ticks) = self.config.max_ticks {
                if self.log.len() >= max_ticks {
                    debug!(max_ticks, "최대 틱 수 도달");
                    break;
                }
            }
            if !self.advance().await? {
                break;
            }
        }

        strategy.on_exit(&ctx).await?;

        let stats = compute_stats(&self.log)?;
        let mut order_count = 0;
        let mut exchange_names = Vec::with_capacity(self.exchanges.len());
        for exchange in &self.exchanges {
            order_count += exchange.order_count().await;
            exchange_names.push(exchange.name().to_string());
        }

        info!(
            ticks = self.log.len(),
            orders = order_count,
            equity_return = %stats.equity_return,
            max_drawdown = %stats.max_drawdown,
            "백테스트 완료"
        );

        Ok(BacktestReport::new(
            strategy,
            self.config.clone(),
            exchange_names,
            stats,
            self.log.len(),
            order_count,
        ))
    }

    /// 현재 틱의 거래소 상태를 기록합니다.
    async fn snapshot(&self) -> BacktestResult<LogItem> {
        let mut time = None;
        let mut ticks = Vec::with_capacity(self.exchanges.len());
        for exchange in &self.exchanges {
            let book = exchange.current_order_book().await;
            let balance = exchange.account_balance().await?;
            if time.is_none() {
                time = book.as_ref().map(|b| b.time);
            }
            ticks.push(ExchangeTick {
                name: exchange.name().to_string(),
                ask: book.as_ref().map(|b| b.ask_price()).unwrap_or_default(),
                bid: book.as_ref().map(|b| b.bid_price()).unwrap_or_default(),
                balance: balance.available,
                equity: balance.equity,
            });
        }
        let time = time.ok_or_else(|| BacktestError::NoData("현재 스냅샷이 없습니다".to_string()))?;
        Ok(LogItem {
            time,
            exchanges: ticks,
        })
    }

    /// 모든 커서를 한 칸 전진합니다. 하나라도 소진되면 `false`.
    async fn advance(&self) -> BacktestResult<bool> {
        let mut more = true;
        for cursor in &self.cursors {
            if !cursor.write().await.next().await? {
                more = false;
            }
        }
        Ok(more)
    }
}
