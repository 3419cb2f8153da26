//! 백테스팅을 위한 시뮬레이션 거래소.
//!
//! 이 모듈은 다음 기능을 제공합니다:
//! - 호가창 스냅샷 기반 주문 매칭 (시장가/지정가/스톱, post-only, reduce-only)
//! - 계약 규약별 평균가/손익 계산 (인버스, 리니어, 현물)
//! - 단방향/양방향 포지션 관리
//! - JSON Lines 이벤트 로그와 타입별 구독 채널
//!
//! # 예제
//!
//! ```ignore
//! use trader_exchange::simulated::SimulatedExchange;
//!
//! let config = SimulatedExchangeConfig::inverse("BTC-PERP", "BTC", dec!(1))
//!     .with_fees(dec!(-0.00025), dec!(0.00075));
//! let exchange = SimulatedExchange::new(config, cursor, id_gen)?;
//!
//! let order = exchange
//!     .place_order("BTC-PERP", Side::Buy, OrderType::Market, dec!(0), dec!(100), PlaceOrderOptions::new())
//!     .await?;
//! ```

mod convention;
mod event_log;
mod exchange;
mod matching_engine;
mod stream;

pub use convention::{
    convention_for, harmonic_avg_price, inverse_pnl, linear_avg_price, linear_pnl,
    ContractConvention, InverseContract, LinearContract, SpotMarket,
};
pub use event_log::{format_ts, EventLog, EventRecord, EVENT_TS_FORMAT};
pub use exchange::SimulatedExchange;
pub use matching_engine::{EngineEvent, EngineEventKind, Liquidity, MatchingEngine, OrderMatch};
pub use stream::{EventBroadcaster, DEFAULT_CHANNEL_CAPACITY};
