//! 계약 규약: 평균 진입가, 실현 손익, 수수료 명목 가치, 수량 단위 규칙.
//!
//! 매칭 엔진은 하나이고, 규약만 생성 시점에 선택합니다.

use std::fmt::Debug;

use rust_decimal::Decimal;
use trader_core::{ContractKind, DecimalExt, Price, Quantity, Side};

/// 계약 규약.
pub trait ContractConvention: Send + Sync + Debug {
    /// 규약 종류.
    fn kind(&self) -> ContractKind;

    /// 같은 방향 체결 후 평균 진입가. 크기는 절대값입니다.
    fn avg_price(&self, old_size: Quantity, old_avg: Price, add_size: Quantity, price: Price) -> Price;

    /// `side` 포지션 `size`(절대값)를 `entry`에 진입해 `exit`에 청산했을 때의 손익.
    fn pnl(&self, side: Side, size: Quantity, entry: Price, exit: Price) -> Decimal;

    /// 수수료 계산에 쓰이는 명목 가치 (계정 통화 기준).
    fn notional(&self, size: Quantity, price: Price) -> Decimal;

    /// 주문 수량이 수량 단위 규칙을 만족하는지 확인합니다.
    fn is_valid_lot(&self, size: Quantity, lot_size: Quantity) -> bool {
        size.is_multiple_of(lot_size)
    }

    /// 순포지션이 음수가 될 수 있는지.
    fn allows_short(&self) -> bool {
        true
    }
}

/// 규약 종류에 맞는 구현을 생성합니다.
pub fn convention_for(kind: ContractKind) -> Box<dyn ContractConvention> {
    match kind {
        ContractKind::Inverse => Box::new(InverseContract),
        ContractKind::Linear => Box::new(LinearContract),
        ContractKind::Spot => Box::new(SpotMarket),
    }
}

/// 조화 평균 진입가: `total / (old/oldAvg + add/price)`.
pub fn harmonic_avg_price(old_size: Quantity, old_avg: Price, add_size: Quantity, price: Price) -> Price {
    if old_size.is_zero() || old_avg.is_zero() || price == old_avg {
        return if old_size.is_zero() { price } else { old_avg };
    }
    if price.is_zero() {
        return old_avg;
    }
    let total = old_size + add_size;
    total / (old_size / old_avg + add_size / price)
}

/// 선형 가중 평균 진입가: `(old*oldAvg + add*price) / total`.
pub fn linear_avg_price(old_size: Quantity, old_avg: Price, add_size: Quantity, price: Price) -> Price {
    if old_size.is_zero() {
        return price;
    }
    if price == old_avg {
        return old_avg;
    }
    let total = old_size + add_size;
    if total.is_zero() {
        return price;
    }
    (old_size * old_avg + add_size * price) / total
}

/// 인버스 계약 손익 (코인 단위).
///
/// 롱: `(entry-exit)/exit * (size/entry) * -1`, 숏: `(entry-exit)/exit * (size/entry)`.
pub fn inverse_pnl(side: Side, size: Quantity, entry: Price, exit: Price) -> Decimal {
    if size.is_zero() || entry.is_zero() || exit.is_zero() {
        return Decimal::ZERO;
    }
    let pnl = (entry - exit) / exit * (size / entry);
    match side {
        Side::Buy => -pnl,
        Side::Sell => pnl,
    }
}

/// 리니어 계약 손익: `size * (exit - entry)`, 숏은 부호 반전.
pub fn linear_pnl(side: Side, size: Quantity, entry: Price, exit: Price) -> Decimal {
    size * (exit - entry) * side.sign()
}

/// 인버스(코인 증거금) 계약. 수량은 정수 계약 수입니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseContract;

impl ContractConvention for InverseContract {
    fn kind(&self) -> ContractKind {
        ContractKind::Inverse
    }

    fn avg_price(&self, old_size: Quantity, old_avg: Price, add_size: Quantity, price: Price) -> Price {
        harmonic_avg_price(old_size, old_avg, add_size, price)
    }

    fn pnl(&self, side: Side, size: Quantity, entry: Price, exit: Price) -> Decimal {
        inverse_pnl(side, size, entry, exit)
    }

    fn notional(&self, size: Quantity, price: Price) -> Decimal {
        if price.is_zero() {
            return Decimal::ZERO;
        }
        size / price
    }

    fn is_valid_lot(&self, size: Quantity, lot_size: Quantity) -> bool {
        size.fract().is_zero() && size.is_multiple_of(lot_size)
    }
}

/// 리니어(USD 증거금) 계약.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearContract;

impl ContractConvention for LinearContract {
    fn kind(&self) -> ContractKind {
        ContractKind::Linear
    }

    fn avg_price(&self, old_size: Quantity, old_avg: Price, add_size: Quantity, price: Price) -> Price {
        linear_avg_price(old_size, old_avg, add_size, price)
    }

    fn pnl(&self, side: Side, size: Quantity, entry: Price, exit: Price) -> Decimal {
        linear_pnl(side, size, entry, exit)
    }

    fn notional(&self, size: Quantity, price: Price) -> Decimal {
        size * price
    }
}

/// 현물. 공매도 불가.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpotMarket;

impl ContractConvention for SpotMarket {
    fn kind(&self) -> ContractKind {
        ContractKind::Spot
    }

    fn avg_price(&self, old_size: Quantity, old_avg: Price, add_size: Quantity, price: Price) -> Price {
        linear_avg_price(old_size, old_avg, add_size, price)
    }

    fn pnl(&self, side: Side, size: Quantity, entry: Price, exit: Price) -> Decimal {
        linear_pnl(side, size, entry, exit)
    }

    fn notional(&self, size: Quantity, price: Price) -> Decimal {
        size * price
    }

    fn allows_short(&self) -> bool {
        false
    }
}
