//! JSON Lines 형식의 주문/체결 이벤트 로그.
//!
//! 한 줄에 하나의 JSON 객체를 추가하고 줄마다 flush합니다. 각 줄은 독립적으로 파싱됩니다.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use trader_core::{Balance, Order, OrderBook, Position};

use super::matching_engine::{EngineEvent, OrderMatch};
use crate::error::{ExchangeError, ExchangeResult};

/// 타임스탬프 형식 (시뮬레이션 시각, 밀리초, 오프셋 포함).
pub const EVENT_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// 로그 한 줄.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// `"order"` 또는 `"deal"`
    pub event: String,
    pub ts: String,
    /// 이벤트를 기록한 거래소 이름
    pub exchange: String,
    pub order: Order,
    pub orderbook: Option<OrderBook>,
    pub positions: Vec<Position>,
    pub balance: Balance,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal: Option<OrderMatch>,
}

impl EventRecord {
    /// 엔진 이벤트에서 레코드를 만듭니다.
    pub fn from_engine_event(
        exchange: &str,
        time: DateTime<Utc>,
        event: &EngineEvent,
        book: Option<&OrderBook>,
    ) -> Self {
        Self {
            event: event.kind.as_str().to_string(),
            ts: format_ts(time),
            exchange: exchange.to_string(),
            order: event.order.clone(),
            orderbook: book.cloned(),
            positions: event.positions.clone(),
            balance: event.balance.clone(),
            msg: event.msg.clone(),
            deal: event.deal.clone(),
        }
    }
}

/// 이벤트 타임스탬프 문자열.
pub fn format_ts(time: DateTime<Utc>) -> String {
    time.format(EVENT_TS_FORMAT).to_string()
}

/// 추가 전용 이벤트 로그 파일.
///
/// 한 실행의 모든 거래소가 같은 로그를 공유합니다.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl EventLog {
    /// 파일을 추가 모드로 엽니다. 상위 디렉터리가 없으면 생성합니다.
    pub fn open(path: impl AsRef<Path>) -> ExchangeResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "이벤트 로그 열림");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 레코드 한 줄을 기록하고 flush합니다.
    pub fn append(&self, record: &EventRecord) -> ExchangeResult<()> {
        let line = serde_json::to_string(record)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ExchangeError::EventLog("event log writer poisoned".to_string()))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// 로그 파일의 모든 줄을 파싱합니다. 빈 줄은 건너뜁니다.
    pub fn read_records(path: impl AsRef<Path>) -> ExchangeResult<Vec<EventRecord>> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ts_format() {
        let t = Utc.with_ymd_and_hms(2019, 10, 1, 12, 30, 5).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(format_ts(t), "2019-10-01T12:30:05.042+00:00");
    }
}
