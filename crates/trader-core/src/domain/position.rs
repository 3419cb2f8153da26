//! 포지션 및 잔고.

use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::Side;

/// 심볼별 포지션.
///
/// `size`는 부호를 가집니다 (양수 롱, 음수 숏). `avg_price`는 아직 열려 있는
/// 진입 체결들의 평균이며 계산 방식은 계약 규약에 따릅니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 심볼
    pub symbol: String,
    /// 최초 진입 시각
    pub open_time: DateTime<Utc>,
    /// 최초 진입 가격
    pub open_price: Price,
    /// 부호 있는 크기
    pub size: Quantity,
    /// 평균 진입 가격
    pub avg_price: Price,
}

impl Position {
    /// 크기 0의 포지션을 생성합니다.
    pub fn flat(symbol: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            open_time: time,
            open_price: Decimal::ZERO,
            size: Decimal::ZERO,
            avg_price: Decimal::ZERO,
        }
    }

    /// 포지션이 없는지 확인합니다.
    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    /// 롱 포지션인지 확인합니다.
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    /// 숏 포지션인지 확인합니다.
    pub fn is_short(&self) -> bool {
        self.size < Decimal::ZERO
    }

    /// 포지션 방향. 포지션이 없으면 `None`.
    pub fn side(&self) -> Option<Side> {
        if self.is_long() {
            Some(Side::Buy)
        } else if self.is_short() {
            Some(Side::Sell)
        } else {
            None
        }
    }

    /// 크기의 절대값.
    pub fn abs_size(&self) -> Quantity {
        self.size.abs()
    }

    /// 포지션을 정리할 때 사용되는 호가 (롱은 매수호가, 숏은 매도호가).
    pub fn closing_price(&self, bid: Price, ask: Price) -> Price {
        if self.is_long() {
            bid
        } else {
            ask
        }
    }
}

/// 계정 잔고.
///
/// `equity = available + 미실현 손익`. 실현 손익은 `available`에 바로 반영됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// 통화
    pub currency: String,
    /// 가용 잔고
    pub available: Decimal,
    /// 평가 자산
    pub equity: Decimal,
}

impl Balance {
    /// 새 잔고를 생성합니다.
    pub fn new(currency: impl Into<String>, available: Decimal, equity: Decimal) -> Self {
        Self {
            currency: currency.into(),
            available,
            equity,
        }
    }

    /// 미실현 손익.
    pub fn unrealized_pnl(&self) -> Decimal {
        self.equity - self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_side() {
        let mut position = Position::flat("BTC-PERP", Utc::now());
        assert!(position.is_flat());
        assert_eq!(position.side(), None);

        position.size = dec!(-3);
        assert!(position.is_short());
        assert_eq!(position.side(), Some(Side::Sell));
        assert_eq!(position.abs_size(), dec!(3));
        assert_eq!(position.closing_price(dec!(99), dec!(101)), dec!(101));
    }

    #[test]
    fn test_balance_unrealized() {
        let balance = Balance::new("BTC", dec!(1.5), dec!(1.75));
        assert_eq!(balance.unrealized_pnl(), dec!(0.25));
    }
}
