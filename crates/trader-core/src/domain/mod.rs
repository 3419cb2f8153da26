//! 트레이딩 운영을 위한 도메인 모델.

mod market_data;
mod order;
mod position;

pub use market_data::*;
pub use order::*;
pub use position::*;
