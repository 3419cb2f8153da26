//! 내장 전략.

mod quoter;

pub use quoter::{QuoterConfig, QuoterStrategy};
