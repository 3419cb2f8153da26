//! 틱 단위 기록과 실행 통계.
//!
//! 드라이버는 매 틱마다 [`LogItem`]을 쌓고, 실행이 끝나면 [`compute_stats`]로
//! 구간 수익률, 단순 보유 대비 수익, 연율화 수익률, 최대 낙폭을 계산합니다.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::engine::{BacktestError, BacktestResult};

/// 연율화 기준 일수.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// 연율화에 필요한 최소 기간 (일).
const MIN_ANNUALIZE_DAYS: f64 = 2.0;

/// 한 거래소의 틱 시점 상태.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTick {
    /// 거래소 이름
    pub name: String,
    pub ask: Decimal,
    pub bid: Decimal,
    /// 가용 잔고
    pub balance: Decimal,
    /// 평가 자산
    pub equity: Decimal,
}

impl ExchangeTick {
    /// 중간 가격. 한쪽 호가만 있으면 그쪽 가격.
    pub fn mid_price(&self) -> Decimal {
        match (self.ask.is_zero(), self.bid.is_zero()) {
            (false, false) => (self.ask + self.bid) / Decimal::TWO,
            (false, true) => self.ask,
            (true, false) => self.bid,
            (true, true) => Decimal::ZERO,
        }
    }
}

/// 한 틱의 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogItem {
    pub time: DateTime<Utc>,
    /// 등록 순서대로의 거래소 상태
    pub exchanges: Vec<ExchangeTick>,
}

impl LogItem {
    /// 모든 거래소 평가 자산의 합.
    pub fn total_equity(&self) -> Decimal {
        self.exchanges.iter().map(|e| e.equity).sum()
    }

    /// 첫 거래소의 중간 가격.
    pub fn reference_price(&self) -> Decimal {
        self.exchanges
            .first()
            .map(ExchangeTick::mid_price)
            .unwrap_or(Decimal::ZERO)
    }
}

/// 실행 통계.
///
/// `_pct`로 끝나는 필드는 비율입니다 (0.1 = 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestStats {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// 기간 (일)
    pub days: f64,
    /// 시작 시점 기준 가격 (첫 거래소 중간 가격)
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// 시작 시점 총 평가 자산
    pub entry_equity: Decimal,
    pub exit_equity: Decimal,
    /// 단순 보유 수익
    pub buy_and_hold_return: Decimal,
    pub buy_and_hold_return_pct: Decimal,
    /// 평가 자산 변화
    pub equity_return: Decimal,
    pub equity_return_pct: Decimal,
    /// 연율화 수익률 (기간이 2일 미만이면 0)
    pub annualized_return: f64,
    /// 최대 낙폭
    pub max_drawdown: Decimal,
}

/// 틱 기록에서 통계를 계산합니다.
pub fn compute_stats(log: &[LogItem]) -> BacktestResult<BacktestStats> {
    let (first, last) = match (log.first(), log.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(BacktestError::NoData("틱 기록이 비어있습니다".to_string())),
    };

    let days = (last.time - first.time).num_milliseconds() as f64 / 86_400_000.0;
    let entry_price = first.reference_price();
    let exit_price = last.reference_price();
    let entry_equity = first.total_equity();
    let exit_equity = last.total_equity();

    let buy_and_hold_return_pct = ratio(exit_price - entry_price, entry_price);
    let buy_and_hold_return = buy_and_hold_return_pct * entry_equity;

    let equity_return = exit_equity - entry_equity;
    let equity_return_pct = ratio(equity_return, entry_equity);

    let equity_curve: Vec<Decimal> = log.iter().map(LogItem::total_equity).collect();

    Ok(BacktestStats {
        start: first.time,
        end: last.time,
        days,
        entry_price,
        exit_price,
        entry_equity,
        exit_equity,
        buy_and_hold_return,
        buy_and_hold_return_pct,
        equity_return,
        equity_return_pct,
        annualized_return: annualize(equity_return_pct, days),
        max_drawdown: max_drawdown(&equity_curve),
    })
}

/// 최대 낙폭: `max_i 1 - equity[i] / max(equity[0..=i])`.
///
/// 고점이 0 이하인 구간은 건너뜁니다.
pub fn max_drawdown(equity_curve: &[Decimal]) -> Decimal {
    let mut peak = match equity_curve.first() {
        Some(first) => *first,
        None => return Decimal::ZERO,
    };

    let mut max_drawdown = Decimal::ZERO;
    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if peak > Decimal::ZERO {
            let drawdown = Decimal::ONE - equity / peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }
    max_drawdown
}

/// `(1 + r)^(365 / days) - 1`. 기간이 짧으면 0.
fn annualize(return_pct: Decimal, days: f64) -> f64 {
    if days < MIN_ANNUALIZE_DAYS {
        return 0.0;
    }
    let r = return_pct.to_f64().unwrap_or(0.0);
    (1.0 + r).powf(DAYS_PER_YEAR / days) - 1.0
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}
