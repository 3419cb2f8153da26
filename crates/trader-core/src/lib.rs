//! # Trader Core
//!
//! 시뮬레이션 거래소와 백테스트가 공유하는 핵심 도메인 모델 및 타입을 제공합니다:
//! - 호가창 스냅샷과 호가 소진 연산
//! - 주문 상태 머신 및 주문 옵션
//! - 포지션과 잔고
//! - 주문 ID 생성기
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use id::*;
pub use logging::*;
pub use types::*;
