//! 호가창 백테스트 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 합성 데이터 생성 (1분 간격 10,000개)
//! trader generate-data -s BTC-PERP -f 2019-10-01 -n 10000 -o data/btc_perp.csv
//!
//! # 설정 파일로 백테스트 실행
//! trader backtest -c config/backtest.toml
//!
//! # 사용 가능한 전략 목록 보기
//! trader backtest --list-strategies
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{error, info};

use trader_cli::commands::backtest::{run_backtest, BacktestArgs, AVAILABLE_STRATEGIES};
use trader_cli::commands::generate::{generate_data, parse_start, GenerateArgs};
use trader_core::logging::{init_logging, LogConfig};
use trader_core::AppConfig;

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "Order book backtesting CLI - 호가창 기반 시뮬레이션 거래소 백테스트", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 백테스트 실행
    Backtest {
        /// 설정 파일 (TOML)
        #[arg(short, long, default_value = "config/backtest.toml")]
        config: PathBuf,

        /// 결과 저장 디렉토리 (설정 파일의 backtest.output_dir 대신 사용)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 최대 틱 수
        #[arg(long)]
        max_ticks: Option<usize>,

        /// 사용 가능한 전략 목록 보기
        #[arg(long)]
        list_strategies: bool,
    },

    /// 합성 호가창 CSV 생성
    GenerateData {
        /// 심볼
        #[arg(short, long, default_value = "BTC-PERP")]
        symbol: String,

        /// 첫 스냅샷 시각 (YYYY-MM-DD 또는 RFC 3339)
        #[arg(short = 'f', long)]
        from: String,

        /// 스냅샷 수
        #[arg(short = 'n', long, default_value = "10000")]
        count: usize,

        /// 시작 가격
        #[arg(short, long, default_value = "8000")]
        price: String,

        /// 한쪽 호가 단계 수
        #[arg(short, long, default_value = "10")]
        depth: usize,

        /// 난수 시드
        #[arg(long, default_value = "0")]
        seed: u64,

        /// 스냅샷 간격 (초)
        #[arg(long, default_value = "60")]
        step: i64,

        /// 출력 파일 경로
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            config,
            output,
            max_ticks,
            list_strategies,
        } => {
            if list_strategies {
                println!("사용 가능한 전략:");
                for name in AVAILABLE_STRATEGIES {
                    println!("  - {}", name);
                }
                return Ok(());
            }

            let app = AppConfig::load(&config)
                .with_context(|| format!("설정 파일 로드 실패: {}", config.display()))?;
            init_logging(LogConfig::from(&app.logging))
                .map_err(|e| anyhow!("로깅 초기화 실패: {}", e))?;

            let args = BacktestArgs {
                config_path: config,
                output_dir: output,
                max_ticks,
            };

            match run_backtest(&app, &args).await {
                Ok(report) => {
                    info!(run_id = %report.run_id, "✅ Backtest finished");
                    println!("\n{}", report.summary());
                }
                Err(e) => {
                    error!(error = %e, "Backtest failed");
                    return Err(e);
                }
            }
        }

        Commands::GenerateData {
            symbol,
            from,
            count,
            price,
            depth,
            seed,
            step,
            output,
        } => {
            init_logging(LogConfig::from_env()).map_err(|e| anyhow!("로깅 초기화 실패: {}", e))?;

            let start_price: Decimal = price
                .parse()
                .with_context(|| format!("잘못된 가격: {}", price))?;
            let args = GenerateArgs {
                symbol,
                start: parse_start(&from)?,
                count,
                start_price,
                depth,
                seed,
                step_secs: step,
                output,
            };

            let written = generate_data(&args)?;
            println!("\n데이터 생성 완료: {} 스냅샷", written);
            println!("저장 위치: {}", args.output.display());
        }
    }

    Ok(())
}
