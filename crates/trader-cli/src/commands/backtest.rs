//! 백테스트 명령어.
//!
//! 설정 파일의 데이터 소스와 시뮬레이션 거래소로 전략을 백테스트합니다.
//!
//! # 사용 예시
//!
//! ```bash
//! # 설정 파일 그대로 실행
//! trader backtest -c config/backtest.toml
//!
//! # 결과 디렉토리 변경, 처음 1000틱만 실행
//! trader backtest -c config/backtest.toml -o output/quick --max-ticks 1000
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use trader_analytics::backtest::{
    BacktestConfig, BacktestEngine, BacktestReport, TRADE_LOG_FILE_NAME,
};
use trader_core::{AppConfig, DataConfig, DataSourceKind, IdGenerator};
use trader_data::{
    generate_sample_order_books, CsvOrderBookLoader, DataCursor, MemoryLoader,
    PgOrderBookLoader, SampleSpec, SharedCursor,
};
use trader_exchange::{EventLog, SimulatedExchange};
use trader_strategy::{QuoterConfig, QuoterStrategy, Strategy};

/// 백테스트 CLI 옵션
#[derive(Debug, Clone)]
pub struct BacktestArgs {
    /// 설정 파일 경로
    pub config_path: PathBuf,
    /// 결과 디렉토리 (설정 파일 값 대신 사용)
    pub output_dir: Option<PathBuf>,
    /// 최대 틱 수
    pub max_ticks: Option<usize>,
}

/// 지원하는 전략 이름
pub const AVAILABLE_STRATEGIES: &[&str] = &["quoter"];

/// 백테스트 실행
pub async fn run_backtest(app: &AppConfig, args: &BacktestArgs) -> Result<BacktestReport> {
    let mut backtest_config = BacktestConfig::from(&app.backtest);
    if let Some(dir) = &args.output_dir {
        backtest_config.output_dir = Some(dir.clone());
    }
    if let Some(max_ticks) = args.max_ticks {
        backtest_config = backtest_config.with_max_ticks(max_ticks);
    }
    let output_dir = backtest_config
        .output_dir
        .clone()
        .unwrap_or_else(|| app.backtest.output_dir.clone());

    info!(
        config = %args.config_path.display(),
        output = %output_dir.display(),
        source = ?app.data.source,
        "백테스트 준비"
    );

    let event_log = Arc::new(
        EventLog::open(output_dir.join(TRADE_LOG_FILE_NAME))
            .context("이벤트 로그를 열 수 없습니다")?,
    );
    let id_gen = Arc::new(IdGenerator::new(app.backtest.start));
    let cursor = build_cursor(&app.data, app.backtest.start).await?;

    let mut engine = BacktestEngine::new(backtest_config);
    for exchange_config in &app.exchanges {
        let exchange = SimulatedExchange::new(exchange_config.clone(), cursor.clone(), id_gen.clone())
            .with_context(|| format!("거래소 생성 실패: {}", exchange_config.name))?
            .with_event_log(event_log.clone());
        engine.add_exchange(Arc::new(exchange), cursor.clone());
    }

    let mut strategy = build_strategy(app)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .map_err(|e| anyhow!("진행 표시 형식 오류: {}", e))?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("{} 백테스트 실행 중...", strategy.name()));

    let result = engine.run(strategy.as_mut()).await;
    match &result {
        Ok(report) => spinner.finish_with_message(format!("백테스트 완료: {} 틱", report.ticks)),
        Err(_) => spinner.abandon_with_message("백테스트 실패"),
    }
    let report = result?;

    info!(
        run_id = %report.run_id,
        trade_log = %event_log.path().display(),
        "백테스트 결과 기록"
    );
    Ok(report)
}

/// 데이터 소스 설정으로 공유 커서를 만듭니다.
async fn build_cursor(data: &DataConfig, start: DateTime<Utc>) -> Result<SharedCursor> {
    let cursor = match data.source {
        DataSourceKind::Csv => {
            let path = data
                .path
                .as_ref()
                .ok_or_else(|| anyhow!("CSV 소스에는 data.path가 필요합니다"))?;
            DataCursor::new(
                CsvOrderBookLoader::new(path, &data.symbol, data.depth)
                    .with_page_size(data.page_size),
            )
        }
        DataSourceKind::Postgres => {
            let url = data
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow!("Postgres 소스에는 data.database_url이 필요합니다"))?;
            let loader = PgOrderBookLoader::connect(url, &data.symbol, data.page_size)
                .await
                .context("데이터베이스 연결 실패")?;
            DataCursor::new(loader)
        }
        DataSourceKind::Synthetic => {
            let spec = SampleSpec::new(
                &data.symbol,
                start,
                data.synthetic_count,
                data.synthetic_start_price,
            )
            .with_seed(data.synthetic_seed)
            .with_depth(data.depth);
            let books = generate_sample_order_books(&spec);
            info!(count = books.len(), seed = data.synthetic_seed, "합성 데이터 생성");
            DataCursor::new(MemoryLoader::new(books, data.page_size))
        }
    };
    Ok(cursor.into_shared())
}

/// 설정의 전략 이름으로 전략을 생성합니다.
fn build_strategy(app: &AppConfig) -> Result<Box<dyn Strategy>> {
    match app.strategy.name.to_lowercase().as_str() {
        "quoter" => Ok(Box::new(QuoterStrategy::new(
            app.data.symbol.clone(),
            QuoterConfig::from(&app.strategy),
        ))),
        other => bail!(
            "알 수 없는 전략: {}. 사용 가능: {}",
            other,
            AVAILABLE_STRATEGIES.join(", ")
        ),
    }
}
