//! # Money Module
//!
//! Provides `Money` (integer paise) and `Percent` (basis points).
//!
//! ## Why Integer Paise?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A GST invoice with 40 lines accumulates that drift into the CGST,     │
//! │  SGST and round-off columns, and the filed return no longer matches.   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise                                            │
//! │    ₹212.40 is stored as 21240. Every percentage is applied in i128     │
//! │    and rounded exactly once, half away from zero.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kirana_core::money::{Money, Percent};
//!
//! let rate = Money::from_rupees_paise(10, 99); // ₹10.99
//! let line = rate * 3;                          // ₹32.97
//! let gst = line.percent_of(Percent::from_bps(1800));
//! assert_eq!(gst.paise(), 593); // 5.9346 → 5.93
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

/// Divides with rounding half away from zero. `den` must be positive.
fn div_round_half_away(num: i128, den: i128) -> i128 {
    let quotient = num / den;
    let remainder = num % den;
    if remainder.abs() * 2 >= den {
        quotient + num.signum()
    } else {
        quotient
    }
}

/// Narrows to `i64`, saturating at the bounds instead of wrapping.
fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in paise (1/100 of a rupee).
///
/// ## Design Decisions
/// - **i64 (signed)**: round-off adjustments and refunds can be negative
/// - **Single field tuple struct**: zero-cost over i64, stored as INTEGER
///
/// ## Where Money is Used
/// ```text
/// LineItem.rate ──► subtotal ──► discount ──► taxable ──► CGST/SGST/IGST
///                                                              │
///                          InvoiceTotals.total ◄── round_off ◄─┘
///                                  │
///                                  ├──► CreditEntry.amount_due
///                                  └──► CreditNote.balance (on returns)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise.
    ///
    /// ```rust
    /// use kirana_core::money::Money;
    ///
    /// let price = Money::from_paise(1099); // ₹10.99
    /// assert_eq!(price.paise(), 1099);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Creates a Money value from rupees and paise.
    ///
    /// For negative amounts only the rupee part carries the sign:
    /// `from_rupees_paise(-5, 50)` is -₹5.50.
    #[inline]
    pub const fn from_rupees_paise(rupees: i64, paise: i64) -> Self {
        if rupees < 0 {
            Money(rupees * 100 - paise)
        } else {
            Money(rupees * 100 + paise)
        }
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee part (truncated toward zero).
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise part (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
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
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the larger of `self` and zero.
    #[inline]
    pub fn clamp_non_negative(self) -> Self {
        Money(self.0.max(0))
    }

    /// Multiplies by a line quantity, saturating on overflow.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Applies a percentage and rounds half away from zero to the paisa.
    ///
    /// ```rust
    /// use kirana_core::money::{Money, Percent};
    ///
    /// // ₹180.00 × 18% = ₹32.40
    /// let tax = Money::from_rupees(180).percent_of(Percent::from_bps(1800));
    /// assert_eq!(tax.paise(), 3240);
    /// ```
    pub fn percent_of(&self, rate: Percent) -> Money {
        self.ratio(rate.bps() as i128, 10_000)
    }

    /// Applies half of a percentage (the CGST or SGST share of a GST rate).
    ///
    /// Computed as `amount × bps / 20000` so rates with an odd number of
    /// basis points (0.25% → 0.125%) do not lose precision.
    pub fn half_percent_of(&self, rate: Percent) -> Money {
        self.ratio(rate.bps() as i128, 20_000)
    }

    fn ratio(&self, numerator: i128, denominator: i128) -> Money {
        Money(saturate(div_round_half_away(self.0 as i128 * numerator, denominator)))
    }

    /// Rounds to the nearest whole rupee, half away from zero.
    ///
    /// ```rust
    /// use kirana_core::money::Money;
    ///
    /// assert_eq!(Money::from_paise(21240).round_to_rupee().paise(), 21200);
    /// assert_eq!(Money::from_paise(21250).round_to_rupee().paise(), 21300);
    /// assert_eq!(Money::from_paise(-21250).round_to_rupee().paise(), -21300);
    /// ```
    pub fn round_to_rupee(&self) -> Money {
        Money(saturate(div_round_half_away(self.0 as i128, 100) * 100))
    }
}

/// Shows money as `₹12.34`. For debugging and receipts; the UI formats its own.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Percent
// =============================================================================

/// A percentage in basis points (1800 = 18%).
///
/// Used for both line discounts and GST rates. Values above 100% are
/// representable on purpose: the totals engine propagates them rather than
/// rejecting them, and callers constrain inputs with [`crate::validation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Percent(u32);

impl Percent {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Creates a percentage from a display value such as `18.0` or `2.5`.
    ///
    /// Negative and non-finite input saturates to zero; use
    /// [`Percent::try_from_percentage`] when the value comes from a user.
    pub fn from_percentage(pct: f64) -> Self {
        Percent((pct * 100.0).round() as u32)
    }

    /// Largest display percentage that fits in basis points.
    pub const MAX_PERCENTAGE: i64 = u32::MAX as i64 / 100;

    /// Creates a percentage, rejecting NaN, infinities and anything outside
    /// `0..=MAX_PERCENTAGE`.
    ///
    /// ```rust
    /// use kirana_core::money::Percent;
    ///
    /// assert_eq!(Percent::try_from_percentage(12.5).unwrap().bps(), 1250);
    /// assert!(Percent::try_from_percentage(f64::NAN).is_err());
    /// assert!(Percent::try_from_percentage(-1.0).is_err());
    /// assert!(Percent::try_from_percentage(1e12).is_err());
    /// ```
    pub fn try_from_percentage(pct: f64) -> Result<Self, ValidationError> {
        if !pct.is_finite() {
            return Err(ValidationError::InvalidFormat {
                field: "percentage".to_string(),
                reason: format!("must be a finite number, got {}", pct),
            });
        }
        if pct < 0.0 || pct > Self::MAX_PERCENTAGE as f64 {
            return Err(ValidationError::OutOfRange {
                field: "percentage".to_string(),
                min: 0,
                max: Self::MAX_PERCENTAGE,
            });
        }
        Ok(Percent::from_percentage(pct))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_paise() {
        let money = Money::from_paise(1099);
        assert_eq!(money.paise(), 1099);
        assert_eq!(money.rupees(), 10);
        assert_eq!(money.paise_part(), 99);
    }

    #[test]
    fn test_from_rupees_paise() {
        assert_eq!(Money::from_rupees_paise(10, 99).paise(), 1099);
        assert_eq!(Money::from_rupees_paise(-5, 50).paise(), -550);
        assert_eq!(Money::from_rupees(212).paise(), 21200);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_paise(1099).to_string(), "₹10.99");
        assert_eq!(Money::from_paise(500).to_string(), "₹5.00");
        assert_eq!(Money::from_paise(-40).to_string(), "-₹0.40");
        assert_eq!(Money::zero().to_string(), "₹0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_paise(1000);
        let b = Money::from_paise(250);

        assert_eq!((a + b).paise(), 1250);
        assert_eq!((a - b).paise(), 750);
        assert_eq!((a * 3).paise(), 3000);
        assert_eq!((-a).paise(), -1000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.paise(), 1500);
    }

    #[test]
    fn test_percent_of_rounds_half_away_from_zero() {
        // ₹0.25 × 10% = 2.5 paise → 3
        assert_eq!(Money::from_paise(25).percent_of(Percent::from_bps(1000)).paise(), 3);
        // -₹0.25 × 10% = -2.5 paise → -3
        assert_eq!(Money::from_paise(-25).percent_of(Percent::from_bps(1000)).paise(), -3);
        // ₹0.24 × 10% = 2.4 paise → 2
        assert_eq!(Money::from_paise(24).percent_of(Percent::from_bps(1000)).paise(), 2);
    }

    #[test]
    fn test_half_percent_keeps_quarter_percent_precision() {
        // ₹1000 at 0.25% GST: full = ₹2.50, each half = ₹1.25
        let amount = Money::from_rupees(1000);
        let rate = Percent::from_bps(25);
        assert_eq!(amount.percent_of(rate).paise(), 250);
        assert_eq!(amount.half_percent_of(rate).paise(), 125);
    }

    #[test]
    fn test_round_to_rupee() {
        assert_eq!(Money::from_paise(21249).round_to_rupee().paise(), 21200);
        assert_eq!(Money::from_paise(21250).round_to_rupee().paise(), 21300);
        assert_eq!(Money::from_paise(-49).round_to_rupee().paise(), 0);
        assert_eq!(Money::from_paise(-50).round_to_rupee().paise(), -100);
        assert_eq!(Money::zero().round_to_rupee(), Money::zero());
    }

    #[test]
    fn test_percent_conversions() {
        assert_eq!(Percent::from_percentage(18.0).bps(), 1800);
        assert_eq!(Percent::from_percentage(0.25).bps(), 25);
        assert!((Percent::from_bps(1250).percentage() - 12.5).abs() < 0.0001);
        assert_eq!(Percent::from_bps(1250).to_string(), "12.50%");
    }

    #[test]
    fn test_try_from_percentage_rejects_non_finite() {
        assert!(Percent::try_from_percentage(f64::INFINITY).is_err());
        assert!(Percent::try_from_percentage(f64::NAN).is_err());
        assert!(Percent::try_from_percentage(-0.5).is_err());
        assert_eq!(Percent::try_from_percentage(0.0).unwrap(), Percent::zero());
    }

    #[test]
    fn test_try_from_percentage_rejects_above_basis_point_range() {
        let max = Percent::MAX_PERCENTAGE as f64;
        assert!(Percent::try_from_percentage(max).is_ok());
        assert!(matches!(
            Percent::try_from_percentage(max + 1.0),
            Err(ValidationError::OutOfRange { max: m, .. }) if m == Percent::MAX_PERCENTAGE
        ));
        assert!(Percent::try_from_percentage(1e12).is_err());
    }

    #[test]
    fn test_extreme_amounts_saturate_instead_of_panicking() {
        let huge = Money::from_paise(i64::MAX / 2);
        assert_eq!(huge.multiply_quantity(3).paise(), i64::MAX);
        assert_eq!((huge * -3).paise(), i64::MIN);
        assert_eq!((huge + huge + huge).paise(), i64::MAX);
        assert_eq!((-huge - huge - huge).paise(), i64::MIN);
        assert_eq!((-Money::from_paise(i64::MIN)).paise(), i64::MAX);

        // 4294967295 bps of i64::MAX does not fit back into i64.
        assert_eq!(Money::from_paise(i64::MAX).percent_of(Percent::from_bps(u32::MAX)).paise(), i64::MAX);
        assert_eq!(Money::from_paise(i64::MIN).percent_of(Percent::from_bps(u32::MAX)).paise(), i64::MIN);
        assert_eq!(Money::from_paise(i64::MAX).round_to_rupee().paise(), i64::MAX - 7);
    }
}
