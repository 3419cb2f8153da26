//! 설정 관리.
//!
//! 백테스트 실행 설정은 TOML 파일에서 읽고 `TRADER__` 접두사 환경 변수로 덮어씁니다.
//! 예: `TRADER__BACKTEST__OUTPUT_DIR=/tmp/run`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{TraderError, TraderResult};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 백테스트 기간 및 출력 설정
    pub backtest: BacktestSection,
    /// 과거 데이터 소스 설정
    pub data: DataConfig,
    /// 시뮬레이션 거래소 목록
    #[serde(default)]
    pub exchanges: Vec<SimulatedExchangeConfig>,
    /// 전략 설정
    #[serde(default)]
    pub strategy: StrategyConfig,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 백테스트 기간 및 출력 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BacktestSection {
    /// 시작 시각 (포함)
    pub start: DateTime<Utc>,
    /// 종료 시각 (제외)
    pub end: DateTime<Utc>,
    /// 결과 파일 디렉토리
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

/// 과거 데이터 소스 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    /// 고정 폭 CSV 파일
    Csv,
    /// PostgreSQL 테이블
    Postgres,
    /// 시드 기반 합성 데이터
    Synthetic,
}

/// 과거 데이터 소스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// 소스 종류
    pub source: DataSourceKind,
    /// 심볼
    pub symbol: String,
    /// CSV 파일 경로
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// 한쪽 호가 단계 수
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// 로더 한 번에 읽는 스냅샷 수
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// 데이터베이스 URL
    #[serde(default)]
    pub database_url: Option<String>,
    /// 합성 데이터 스냅샷 수
    #[serde(default = "default_synthetic_count")]
    pub synthetic_count: usize,
    /// 합성 데이터 시드
    #[serde(default)]
    pub synthetic_seed: u64,
    /// 합성 데이터 시작 가격
    #[serde(default = "default_synthetic_start_price")]
    pub synthetic_start_price: Decimal,
}

fn default_depth() -> usize {
    10
}
fn default_page_size() -> usize {
    1000
}
fn default_synthetic_count() -> usize {
    10_000
}
fn default_synthetic_start_price() -> Decimal {
    Decimal::from(8000)
}

/// 계약 규약 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    /// 인버스(코인 증거금) 계약
    Inverse,
    /// 리니어(USD 증거금) 계약
    Linear,
    /// 현물
    Spot,
}

/// 포지션 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// 심볼당 순포지션 하나
    #[default]
    OneWay,
    /// 롱/숏 슬롯 분리
    Hedged,
}

/// 지정가 체결 모델.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillModel {
    /// 지정가 그대로 전량 체결
    #[default]
    LimitPrice,
    /// 호가 깊이를 소진하며 부분 체결
    Depth,
}

/// 시뮬레이션 거래소 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatedExchangeConfig {
    /// 거래소 이름 (로그/통계용)
    #[serde(default = "default_exchange_name")]
    pub name: String,
    /// 거래 심볼
    pub symbol: String,
    /// 잔고 통화
    pub currency: String,
    /// 계약 규약
    pub contract: ContractKind,
    /// 포지션 모드
    #[serde(default)]
    pub position_mode: PositionMode,
    /// 지정가 체결 모델
    #[serde(default)]
    pub fill_model: FillModel,
    /// 초기 잔고
    pub initial_balance: Decimal,
    /// 메이커 수수료율 (음수면 리베이트)
    #[serde(default)]
    pub maker_fee_rate: Decimal,
    /// 테이커 수수료율
    #[serde(default)]
    pub taker_fee_rate: Decimal,
    /// 주문 수량 단위
    #[serde(default = "default_lot_size")]
    pub lot_size: Decimal,
    /// 최대 포지션 크기 (절대값)
    #[serde(default)]
    pub max_position_size: Option<Decimal>,
}

fn default_exchange_name() -> String {
    "sim".to_string()
}
fn default_lot_size() -> Decimal {
    Decimal::ONE
}

impl SimulatedExchangeConfig {
    /// 인버스 무기한 계약 기본 설정.
    pub fn inverse(symbol: impl Into<String>, currency: impl Into<String>, balance: Decimal) -> Self {
        Self {
            name: default_exchange_name(),
            symbol: symbol.into(),
            currency: currency.into(),
            contract: ContractKind::Inverse,
            position_mode: PositionMode::OneWay,
            fill_model: FillModel::LimitPrice,
            initial_balance: balance,
            maker_fee_rate: Decimal::ZERO,
            taker_fee_rate: Decimal::ZERO,
            lot_size: Decimal::ONE,
            max_position_size: None,
        }
    }

    /// 리니어 계약 기본 설정.
    pub fn linear(symbol: impl Into<String>, currency: impl Into<String>, balance: Decimal) -> Self {
        Self {
            contract: ContractKind::Linear,
            ..Self::inverse(symbol, currency, balance)
        }
    }

    /// 현물 기본 설정.
    pub fn spot(symbol: impl Into<String>, currency: impl Into<String>, balance: Decimal) -> Self {
        Self {
            contract: ContractKind::Spot,
            ..Self::inverse(symbol, currency, balance)
        }
    }

    /// 거래소 이름을 설정합니다.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 메이커/테이커 수수료율을 설정합니다.
    pub fn with_fees(mut self, maker: Decimal, taker: Decimal) -> Self {
        self.maker_fee_rate = maker;
        self.taker_fee_rate = taker;
        self
    }

    /// 주문 수량 단위를 설정합니다.
    pub fn with_lot_size(mut self, lot_size: Decimal) -> Self {
        self.lot_size = lot_size;
        self
    }

    /// 최대 포지션 크기를 설정합니다.
    pub fn with_max_position(mut self, max: Decimal) -> Self {
        self.max_position_size = Some(max);
        self
    }

    /// 포지션 모드를 설정합니다.
    pub fn with_position_mode(mut self, mode: PositionMode) -> Self {
        self.position_mode = mode;
        self
    }

    /// 지정가 체결 모델을 설정합니다.
    pub fn with_fill_model(mut self, model: FillModel) -> Self {
        self.fill_model = model;
        self
    }

    /// 설정 유효성을 검사합니다.
    pub fn validate(&self) -> TraderResult<()> {
        if self.symbol.is_empty() {
            return Err(TraderError::Config("symbol이 비어 있습니다".to_string()));
        }
        if self.lot_size <= Decimal::ZERO {
            return Err(TraderError::Config(format!(
                "lot_size는 양수여야 합니다: {}",
                self.lot_size
            )));
        }
        if self.taker_fee_rate < Decimal::ZERO {
            return Err(TraderError::Config(format!(
                "taker_fee_rate는 음수일 수 없습니다: {}",
                self.taker_fee_rate
            )));
        }
        if let Some(max) = self.max_position_size {
            if max <= Decimal::ZERO {
                return Err(TraderError::Config(format!(
                    "max_position_size는 양수여야 합니다: {}",
                    max
                )));
            }
        }
        if self.contract == ContractKind::Spot && self.position_mode == PositionMode::Hedged {
            return Err(TraderError::Config(
                "현물은 hedged 포지션 모드를 지원하지 않습니다".to_string(),
            ));
        }
        Ok(())
    }
}

/// 전략 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// 전략 이름
    pub name: String,
    /// 주문 수량
    pub order_size: Decimal,
    /// 최대 보유 수량
    pub max_inventory: Decimal,
    /// 호가 갱신 간격 (틱)
    pub refresh_ticks: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "quoter".to_string(),
            order_size: Decimal::from(10),
            max_inventory: Decimal::from(100),
            refresh_ticks: 5,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> TraderResult<Self> {
        let builder = config::Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("TRADER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경 변수 미적용).
    pub fn from_toml_str(content: &str) -> TraderResult<Self> {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 전체의 유효성을 검사합니다.
    pub fn validate(&self) -> TraderResult<()> {
        if self.backtest.start >= self.backtest.end {
            return Err(TraderError::Config(format!(
                "start({})가 end({})보다 앞서야 합니다",
                self.backtest.start, self.backtest.end
            )));
        }
        if self.exchanges.is_empty() {
            return Err(TraderError::Config(
                "시뮬레이션 거래소가 하나 이상 필요합니다".to_string(),
            ));
        }
        if self.data.depth == 0 || self.data.page_size == 0 {
            return Err(TraderError::Config(
                "depth와 page_size는 0보다 커야 합니다".to_string(),
            ));
        }
        match self.data.source {
            DataSourceKind::Csv if self.data.path.is_none() => {
                return Err(TraderError::Config("CSV 소스에는 path가 필요합니다".to_string()));
            }
            DataSourceKind::Postgres if self.data.database_url.is_none() => {
                return Err(TraderError::Config(
                    "Postgres 소스에는 database_url이 필요합니다".to_string(),
                ));
            }
            _ => {}
        }
        for exchange in &self.exchanges {
            exchange.validate()?;
            if exchange.symbol != self.data.symbol {
                return Err(TraderError::Config(format!(
                    "거래소 {}의 심볼({})이 데이터 심볼({})과 다릅니다",
                    exchange.name, exchange.symbol, self.data.symbol
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
[backtest]
start = "2019-10-01T00:00:00Z"
end = "2019-10-03T00:00:00Z"
output_dir = "/tmp/bt"

[data]
source = "synthetic"
symbol = "BTC-PERP"
synthetic_count = 500

[[exchanges]]
name = "deribit-sim"
symbol = "BTC-PERP"
currency = "BTC"
contract = "inverse"
initial_balance = "1"
maker_fee_rate = "-0.00025"
taker_fee_rate = "0.00075"
lot_size = "10"
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.data.depth, 10);
        assert_eq!(config.data.synthetic_count, 500);
        assert_eq!(config.exchanges.len(), 1);

        let exchange = &config.exchanges[0];
        assert_eq!(exchange.contract, ContractKind::Inverse);
        assert_eq!(exchange.position_mode, PositionMode::OneWay);
        assert_eq!(exchange.maker_fee_rate, dec!(-0.00025));
        assert_eq!(exchange.lot_size, dec!(10));
        assert_eq!(config.strategy.name, "quoter");
    }

    #[test]
    fn test_validate_rejects_reversed_range() {
        let content = SAMPLE.replace("2019-10-03", "2019-09-03");
        assert!(AppConfig::from_toml_str(&content).is_err());
    }

    #[test]
    fn test_validate_rejects_symbol_mismatch() {
        let content = SAMPLE.replacen("symbol = \"BTC-PERP\"\ncurrency", "symbol = \"ETH-PERP\"\ncurrency", 1);
        let err = AppConfig::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("ETH-PERP"));
    }

    #[test]
    fn test_exchange_validate() {
        let config = SimulatedExchangeConfig::spot("BTC-USDT", "USDT", dec!(1000))
            .with_position_mode(PositionMode::Hedged);
        assert!(config.validate().is_err());

        let config = SimulatedExchangeConfig::linear("BTC-USDT", "USDT", dec!(1000))
            .with_lot_size(Decimal::ZERO);
        assert!(config.validate().is_err());

        let config = SimulatedExchangeConfig::inverse("BTC-PERP", "BTC", dec!(1))
            .with_fees(dec!(-0.00025), dec!(0.00075))
            .with_max_position(dec!(1000));
        assert!(config.validate().is_ok());
    }
}
