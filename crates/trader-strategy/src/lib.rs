//! 트레이딩 전략 인터페이스와 내장 전략.
//!
//! 이 크레이트가 제공하는 기능:
//! - 백테스트 드라이버가 호출하는 Strategy trait
//! - 전략에 거래소 핸들을 넘기는 StrategyContext
//! - 내장 전략 (호가 제시 QuoterStrategy)
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_strategy::{QuoterConfig, QuoterStrategy, Strategy, StrategyContext, TradeMode};
//!
//! let mut strategy = QuoterStrategy::new("BTC-PERP", QuoterConfig::default());
//! let ctx = StrategyContext::new(TradeMode::Backtest, vec![exchange]);
//! strategy.on_init(&ctx).await?;
//! strategy.on_tick(&ctx).await?;
//! ```

pub mod error;
pub mod strategies;
pub mod traits;

pub use error::{StrategyError, StrategyResult};
pub use strategies::{QuoterConfig, QuoterStrategy};
pub use traits::{Strategy, StrategyContext, TradeMode};
