//! 데이터베이스 기반 로더.

mod order_book;

pub use order_book::{OrderBookRow, PgOrderBookLoader};
