//! 정밀한 금융 계산을 위한 Decimal 유틸리티.

use rust_decimal::Decimal;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문 수량을 위한 타입.
pub type Quantity = Decimal;

/// 퍼센트 타입 (0.01 = 1%).
pub type Percentage = Decimal;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 퍼센트 문자열로 변환합니다 (예: "5.25%").
    fn to_percentage_string(&self) -> String;

    /// `step`의 정수배인지 확인합니다. `step`이 0 이하이면 항상 참입니다.
    fn is_multiple_of(&self, step: Decimal) -> bool;
}

impl DecimalExt for Decimal {
    fn to_percentage_string(&self) -> String {
        let pct = *self * Decimal::ONE_HUNDRED;
        format!("{:.2}%", pct)
    }

    fn is_multiple_of(&self, step: Decimal) -> bool {
        if step <= Decimal::ZERO {
            return true;
        }
        (*self % step).is_zero()
    }
}
