//! 트레이딩 시스템의 에러 타입.

use thiserror::Error;

/// 핵심 트레이딩 에러.
#[derive(Debug, Error)]
pub enum TraderError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 주문 에러
    #[error("주문 에러: {0}")]
    Order(String),

    /// 포지션 에러
    #[error("포지션 에러: {0}")]
    Position(String),

    /// 데이터 에러
    #[error("데이터 에러: {0}")]
    Data(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 입출력 에러
    #[error("입출력 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 트레이딩 작업을 위한 Result 타입.
pub type TraderResult<T> = Result<T, TraderError>;

impl TraderError {
    /// 사용자 입력/설정 문제로 인한 에러인지 확인합니다.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TraderError::Config(_) | TraderError::InvalidInput(_)
        )
    }
}

impl From<serde_json::Error> for TraderError {
    fn from(err: serde_json::Error) -> Self {
        TraderError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for TraderError {
    fn from(err: config::ConfigError) -> Self {
        TraderError::Config(err.to_string())
    }
}
