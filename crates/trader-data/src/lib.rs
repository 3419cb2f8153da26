//! 과거 호가창 데이터 관리.
//!
//! 이 crate는 다음을 제공합니다:
//! - `DataLoader` 계약과 메모리/CSV/PostgreSQL 로더
//! - 버퍼링과 이력 보존을 지원하는 순방향 커서
//! - 재현 가능한 합성 데이터 생성기

pub mod cursor;
pub mod error;
pub mod loader;
pub mod sample;
pub mod store;

pub use cursor::{DataCursor, SharedCursor};
pub use error::{DataError, Result};
pub use loader::{
    parse_timestamp, write_order_books_csv, CsvOrderBookLoader, DataLoader, MemoryLoader,
};
pub use sample::{generate_sample_order_books, SampleSpec};
pub use store::{OrderBookRow, PgOrderBookLoader};
