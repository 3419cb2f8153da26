//! 합성 호가창 데이터 생성 명령어.
//!
//! ```bash
//! trader generate-data -s BTC-PERP -f 2019-10-01 -n 10000 -o data/btc_perp.csv
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use tracing::info;
use trader_data::{generate_sample_order_books, parse_timestamp, write_order_books_csv, SampleSpec};

/// 데이터 생성 옵션
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    pub symbol: String,
    /// 첫 스냅샷 시각
    pub start: DateTime<Utc>,
    pub count: usize,
    pub start_price: Decimal,
    pub depth: usize,
    pub seed: u64,
    /// 스냅샷 간격 (초)
    pub step_secs: i64,
    pub output: PathBuf,
}

/// `YYYY-MM-DD` 또는 RFC 3339 시각을 파싱합니다.
pub fn parse_start(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let time = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("잘못된 날짜: {}", s))?;
        return Ok(time.and_utc());
    }
    parse_timestamp(s).ok_or_else(|| anyhow!("잘못된 시각 형식: {} (YYYY-MM-DD 또는 RFC 3339)", s))
}

/// 합성 데이터를 CSV로 저장하고 스냅샷 수를 반환합니다.
pub fn generate_data(args: &GenerateArgs) -> Result<usize> {
    if args.count == 0 {
        bail!("count는 1 이상이어야 합니다");
    }
    if args.step_secs <= 0 {
        bail!("step은 양수여야 합니다");
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .map_err(|e| anyhow!("진행 표시 형식 오류: {}", e))?,
    );
    pb.set_message(format!("{} 스냅샷 {}개 생성 중...", args.symbol, args.count));

    let spec = SampleSpec::new(&args.symbol, args.start, args.count, args.start_price)
        .with_seed(args.seed)
        .with_depth(args.depth)
        .with_step(chrono::Duration::seconds(args.step_secs));
    let books = generate_sample_order_books(&spec);
    let written = write_order_books_csv(&args.output, &books, args.depth)?;

    pb.finish_with_message(format!("{} 스냅샷 저장 완료", written));
    info!(
        path = %args.output.display(),
        count = written,
        seed = args.seed,
        "합성 데이터 저장"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_start() {
        let expected = Utc.with_ymd_and_hms(2019, 10, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_start("2019-10-01").unwrap(), expected);
        assert_eq!(parse_start("2019-10-01T00:00:00Z").unwrap(), expected);
        assert!(parse_start("yesterday").is_err());
    }
}
