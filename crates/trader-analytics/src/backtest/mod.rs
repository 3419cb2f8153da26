//! 백테스팅 모듈
//!
//! 과거 호가창 데이터로 시뮬레이션 거래소와 전략을 구동하고 성과를 분석합니다.
//!
//! # 주요 구성요소
//!
//! - [`BacktestConfig`]: 백테스트 설정 (구간, 결과 디렉토리)
//! - [`BacktestEngine`]: 틱 단위 실행 엔진
//! - [`LogItem`], [`BacktestStats`]: 틱 기록과 실행 통계
//! - [`BacktestReport`]: 백테스트 결과 리포트

pub mod engine;
pub mod report;
pub mod stats;

pub use engine::{BacktestConfig, BacktestEngine, BacktestError, BacktestResult};
pub use report::{BacktestReport, STATS_FILE_NAME, TRADE_LOG_FILE_NAME};
pub use stats::{compute_stats, max_drawdown, BacktestStats, ExchangeTick, LogItem, DAYS_PER_YEAR};
