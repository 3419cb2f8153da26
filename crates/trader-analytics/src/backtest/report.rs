//! 백테스트 실행 리포트.

use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trader_strategy::Strategy;
use uuid::Uuid;

use super::engine::{BacktestConfig, BacktestResult};
use super::stats::BacktestStats;

/// 통계 파일 이름.
pub const STATS_FILE_NAME: &str = "stats.json";

/// 이벤트 로그 파일 이름. 통계 파일과 같은 디렉토리에 둡니다.
pub const TRADE_LOG_FILE_NAME: &str = "trade.log";

/// 백테스트 실행 리포트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// 실행 ID
    pub run_id: Uuid,

    /// 전략 이름
    pub strategy: String,

    /// 종료 시점 전략 상태
    pub strategy_state: Value,

    /// 설정 정보
    pub config: BacktestConfig,

    /// 거래소 이름 (등록 순서)
    pub exchanges: Vec<String>,

    /// 실행 통계
    pub stats: BacktestStats,

    /// 처리한 틱 수
    pub ticks: usize,

    /// 접수된 주문 수
    pub order_count: usize,
}

impl BacktestReport {
    pub(crate) fn new(
        strategy: &dyn Strategy,
        config: BacktestConfig,
        exchanges: Vec<String>,
        stats: BacktestStats,
        ticks: usize,
        order_count: usize,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            strategy: strategy.name().to_string(),
            strategy_state: strategy.get_state(),
            config,
            exchanges,
            stats,
            ticks,
            order_count,
        }
    }

    /// 요약 문자열 반환
    pub fn summary(&self) -> String {
        let s = &self.stats;
        format!(
            "백테스트 결과 요약 ({})\n\
             ═══════════════════════════════════════\n\
             전략: {}\n\
             거래소: {}\n\
             기간: {} → {} ({:.2} 일)\n\
             틱 수: {}\n\
             주문 수: {}\n\
             ───────────────────────────────────────\n\
             시작 가격: {}\n\
             종료 가격: {}\n\
             단순 보유 수익: {} ({:.2}%)\n\
             ───────────────────────────────────────\n\
             시작 자산: {}\n\
             종료 자산: {}\n\
             자산 수익: {} ({:.2}%)\n\
             연율화 수익률: {:.2}%\n\
             최대 낙폭: {:.2}%\n\
             ═══════════════════════════════════════",
            self.run_id,
            self.strategy,
            self.exchanges.join(", "),
            s.start.format("%Y-%m-%d %H:%M:%S"),
            s.end.format("%Y-%m-%d %H:%M:%S"),
            s.days,
            self.ticks,
            self.order_count,
            s.entry_price,
            s.exit_price,
            s.buy_and_hold_return,
            s.buy_and_hold_return_pct * Decimal::ONE_HUNDRED,
            s.entry_equity,
            s.exit_equity,
            s.equity_return,
            s.equity_return_pct * Decimal::ONE_HUNDRED,
            s.annualized_return * 100.0,
            s.max_drawdown * Decimal::ONE_HUNDRED,
        )
    }

    /// `dir/stats.json`에 리포트를 저장하고 경로를 반환합니다.
    pub fn save(&self, dir: impl AsRef<Path>) -> BacktestResult<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(STATS_FILE_NAME);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// 저장된 리포트를 읽습니다.
    pub fn load(path: impl AsRef<Path>) -> BacktestResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
