//! 전략 에러 타입.

use thiserror::Error;
use trader_exchange::ExchangeError;

/// 전략 실행 에러.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("거래소 에러: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("전략 설정 에러: {0}")]
    Config(String),

    #[error("시장 데이터 없음: {0}")]
    NoMarketData(String),

    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 전략 작업을 위한 Result 타입.
pub type StrategyResult<T> = Result<T, StrategyError>;
