//! 백테스트 드라이버와 실행 분석.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 커서와 시뮬레이션 거래소를 틱 단위로 구동하는 백테스팅 엔진
//! - 틱 기록 기반 실행 통계 (단순 보유 대비 수익, 연율화 수익률, 최대 낙폭)
//! - JSON 리포트 저장

pub mod backtest;

pub use backtest::{
    compute_stats, BacktestConfig, BacktestEngine, BacktestError, BacktestReport,
    BacktestResult, BacktestStats, ExchangeTick, LogItem,
};
