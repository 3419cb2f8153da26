//! 백테스트 CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 설정 파일 기반 백테스트 실행
//! - 합성 호가창 CSV 생성

pub mod commands;
