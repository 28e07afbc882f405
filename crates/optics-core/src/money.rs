//! Integer money.
//!
//! Every price, discount, tax amount and payment is an `i64` count of halalas
//! (1 SAR = 100 halalas), stored in `*_cents` columns. Floats never touch
//! money: three frames at 33.33 plus VAT must reconcile with the VAT report
//! to the halala. Rounding happens in exactly one place,
//! [`Money::calculate_tax`].
//!
//! ```rust
//! use optics_core::money::Money;
//!
//! let lens = Money::from_cents(25000);          // SAR 250.00
//! let pair = lens * 2;
//! let total = pair + Money::from_cents(7500);
//! assert_eq!(total.cents(), 57500);
//! ```

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::TaxRate;

/// An amount in halalas. Signed: credit notes carry negated amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Line total for `qty` units at this unit price.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `None` when the sum leaves `i64`.
    #[inline]
    pub const fn checked_add(&self, rhs: Money) -> Option<Money> {
        match self.0.checked_add(rhs.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// [`multiply_quantity`](Money::multiply_quantity) that returns `None`
    /// on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Tax at `rate`, rounded to the nearest halala, halves away from zero.
    ///
    /// The rounding is symmetric around zero, so the tax on a credit note is
    /// exactly the negation of the tax on the invoice it reverses.
    ///
    /// ```rust
    /// use optics_core::money::Money;
    /// use optics_core::types::TaxRate;
    ///
    /// let vat = Money::from_cents(10000).calculate_tax(TaxRate::from_bps(1500));
    /// assert_eq!(vat.cents(), 1500);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // Widened so a very large invoice cannot overflow before the division.
        let scaled = self.0 as i128 * rate.bps() as i128;
        let half = if scaled < 0 { -5000 } else { 5000 };
        Money(((scaled + half) / 10000) as i64)
    }
}

/// `SAR 115.00` / `-SAR 5.50`. Logs and receipts only; the web UI formats
/// amounts itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}SAR {}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAT: TaxRate = TaxRate::from_bps(1500);

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(11500).to_string(), "SAR 115.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-SAR 5.50");
        assert_eq!(Money::from_cents(7).to_string(), "SAR 0.07");
        assert_eq!(Money::zero().to_string(), "SAR 0.00");
    }

    #[test]
    fn test_operators() {
        let frame = Money::from_cents(45000);
        let lens = Money::from_cents(12000);

        assert_eq!((frame + lens).cents(), 57000);
        assert_eq!((frame - lens).cents(), 33000);
        assert_eq!((lens * 2).cents(), 24000);
        assert_eq!((-lens).cents(), -12000);

        let mut running = frame;
        running += lens;
        running -= Money::from_cents(2000);
        assert_eq!(running.cents(), 55000);
    }

    #[test]
    fn test_vat_on_hundred_riyals() {
        assert_eq!(Money::from_cents(10000).calculate_tax(VAT).cents(), 1500);
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 0.33 × 15% = 0.0495
        assert_eq!(Money::from_cents(33).calculate_tax(VAT).cents(), 5);
        assert_eq!(Money::from_cents(-33).calculate_tax(VAT).cents(), -5);
        // 0.30 × 15% = 0.045
        assert_eq!(Money::from_cents(30).calculate_tax(VAT).cents(), 5);
        // 0.29 × 15% = 0.0435
        assert_eq!(Money::from_cents(29).calculate_tax(VAT).cents(), 4);
    }

    #[test]
    fn test_checked_arithmetic() {
        let huge = Money::from_cents(i64::MAX / 2);
        assert_eq!(huge.checked_multiply_quantity(3), None);
        assert_eq!(huge.checked_add(huge).map(|m| m.cents()), Some(i64::MAX - 1));
        assert_eq!(huge.checked_add(Money::from_cents(i64::MAX)), None);
        assert_eq!(Money::from_cents(2500).checked_multiply_quantity(4), Some(Money::from_cents(10000)));
    }

    #[test]
    fn test_sum_of_lines() {
        let total: Money = [100, 250, -50].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 300);
        assert!(total.is_positive());
        assert!(Money::default().is_zero());
    }
}
