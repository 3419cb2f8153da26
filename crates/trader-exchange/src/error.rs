//! 거래소 에러 타입.

use rust_decimal::Decimal;
use thiserror::Error;
use trader_core::OrderStatus;

/// 거래소 관련 에러.
///
/// 검증 에러는 상태 변경 전에 반환되며, 상태 에러는 다른 주문을 건드리지 않습니다.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 주문 수량이 0
    #[error("Order size is zero")]
    ZeroSize,

    /// 유효하지 않은 수량 (reduce-only 포지션 부족 포함)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// 수량 단위 위반
    #[error("Size {size} is not a multiple of lot size {lot_size}")]
    InvalidLotSize { size: Decimal, lot_size: Decimal },

    /// 유효하지 않은 가격
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// 주문을 찾을 수 없음
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// 현재 상태에서 허용되지 않는 작업
    #[error("Invalid order status for {id}: {status}")]
    InvalidOrderStatus { id: String, status: OrderStatus },

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 자산을 찾을 수 없음
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// 현재 시장 데이터 없음
    #[error("No market data for {0}")]
    NoMarketData(String),

    /// 설정 에러
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 이벤트 로그 입출력 에러
    #[error("Event log error: {0}")]
    EventLog(String),

    /// 데이터 소스 에러
    #[error("Data error: {0}")]
    Data(#[from] trader_data::DataError),

    /// 지원되지 않는 작업
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl ExchangeError {
    /// 주문 검증 에러인지 확인.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExchangeError::ZeroSize
                | ExchangeError::InvalidAmount(_)
                | ExchangeError::InvalidLotSize { .. }
                | ExchangeError::InvalidPrice(_)
        )
    }

    /// 주문 상태/조회 에러인지 확인.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            ExchangeError::OrderNotFound(_) | ExchangeError::InvalidOrderStatus { .. }
        )
    }
}

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        ExchangeError::EventLog(err.to_string())
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::EventLog(err.to_string())
    }
}

impl From<trader_core::TraderError> for ExchangeError {
    fn from(err: trader_core::TraderError) -> Self {
        ExchangeError::InvalidConfig(err.to_string())
    }
}

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 깊이 호가창 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DepthBookError {
    /// 증분 메시지 유실/역전. 새 스냅샷이 필요합니다.
    #[error("Depth book desync for {symbol}: {reason}")]
    Desync { symbol: String, reason: String },

    /// 스냅샷 재동기화 전 상태
    #[error("Depth book for {0} is not synced")]
    NotSynced(String),

    /// 알 수 없는 심볼
    #[error("Unknown depth book symbol: {0}")]
    UnknownSymbol(String),
}
