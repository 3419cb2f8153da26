//! CLI 명령어 구현 모듈.

pub mod backtest;
pub mod generate;
