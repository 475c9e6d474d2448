use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// A monetary value in BRL.
///
/// Wraps `rust_decimal::Decimal` so prices coming from the backend as decimal
/// strings ("1000.00") never pass through floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Rounds to cents, half away from zero.
    pub fn round_cents(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// The displayed amount of one installment: `round(total / installments, 2)`.
    ///
    /// The division is not required to be exact; the result is informational.
    pub fn installment_share(self, installments: u8) -> Self {
        if installments == 0 {
            return self.round_cents();
        }
        Self(self.0 / Decimal::from(installments)).round_cents()
    }

    /// Subtracts a discount without going below zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs >= self { Self::ZERO } else { self - rhs }
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R$ {:.2}", self.round_cents().0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_installment_share_exact() {
        let total = Money::new(dec!(1000.00));
        assert_eq!(total.installment_share(4), Money::new(dec!(250.00)));
    }

    #[test]
    fn test_installment_share_rounds_half_up() {
        // 100 / 3 = 33.333.. -> 33.33 ; 0.05 / 2 = 0.025 -> 0.03
        assert_eq!(
            Money::new(dec!(100)).installment_share(3),
            Money::new(dec!(33.33))
        );
        assert_eq!(
            Money::new(dec!(0.05)).installment_share(2),
            Money::new(dec!(0.03))
        );
    }

    #[test]
    fn test_installment_sum_within_one_cent_per_installment() {
        for total in [dec!(1000), dec!(997.77), dec!(1234.56), dec!(0.99), dec!(1500.01)] {
            for n in 2u8..=7 {
                let share = Money::new(total).installment_share(n);
                let sum = share.value() * Decimal::from(n);
                let diff = (sum - total).abs();
                assert!(
                    diff <= dec!(0.01) * Decimal::from(n),
                    "total={total} n={n} share={share} diff={diff}"
                );
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::new(dec!(250)).to_string(), "R$ 250.00");
        assert_eq!(Money::new(dec!(33.335)).to_string(), "R$ 33.34");
    }

    #[test]
    fn test_saturating_sub() {
        let price = Money::new(dec!(100));
        assert_eq!(price.saturating_sub(Money::new(dec!(30))), Money::new(dec!(70)));
        assert_eq!(price.saturating_sub(Money::new(dec!(130))), Money::ZERO);
    }

    #[test]
    fn test_deserialize_from_string_and_number() {
        let from_str: Money = serde_json::from_str("\"1000.00\"").unwrap();
        let from_num: Money = serde_json::from_str("250").unwrap();
        assert_eq!(from_str, Money::new(dec!(1000.00)));
        assert_eq!(from_num, Money::new(dec!(250)));
    }
}
