//! 거래소 인터페이스, 깊이 호가창, 시뮬레이션 거래소.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Exchange trait: 전략이 사용하는 통합 거래소 인터페이스
//! - 깊이 호가창: 스냅샷/증분 메시지로 유지되는 로컬 호가창
//! - 시뮬레이션 거래소: 과거 호가창 스냅샷을 재생하는 매칭 엔진

pub mod depth;
pub mod error;
pub mod simulated;
pub mod traits;

pub use depth::{
    BookSide, DeltaAction, DepthEntry, DepthMessage, DepthMessageKind, DepthOrderBook,
    LocalOrderBook,
};
pub use error::*;
pub use simulated::{
    ContractConvention, EngineEvent, EngineEventKind, EventBroadcaster, EventLog, EventRecord,
    Liquidity, MatchingEngine, OrderMatch, SimulatedExchange,
};
pub use traits::*;
