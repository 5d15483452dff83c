//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely, and the
//! `ExchangeRate` used to bring dollar amounts into local currency.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RECONCILIATION MUST BE EXACT                                           │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    1150.10 + 279.95 + 40.05 - 1470.10 = 2.2737e-13   ❌ "sin aclarar"   │
//! │                                                                         │
//! │  With integer cents:                                                    │
//! │    115010 + 27995 + 4005 - 147010 = 0                ✅ "cuadrado"      │
//! │                                                                         │
//! │  A variance of exactly zero is what marks a register as balanced, so   │
//! │  every amount in the reconciliation path is an i64 of cents.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::money::{ExchangeRate, Money};
//!
//! let counted = Money::parse_decimal("efectivo", "1200").unwrap();
//! let system = Money::from_major_minor(1150, 0);
//! assert_eq!((counted - system).cents(), 5000);
//!
//! // USD 10.00 at L 24.7500 per dollar
//! let rate = ExchangeRate::from_ten_thousandths(247_500);
//! assert_eq!(rate.convert(Money::from_cents(1000)).cents(), 24_750);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (centavos).
///
/// The same type carries lempira and dollar amounts; which currency a
/// value is in follows from the field it lives in (`usd`, `usd_amount`).
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  pagos.monto ──► SystemTotals (per channel) ──┐                         │
/// │                                               ├──► Variance ──► status  │
/// │  counted (cashier input) ──► CountedTotals ───┘                         │
/// │                                                                         │
/// │  gastos.monto ──► subtracted from system cash                           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts, only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Parses a decimal amount as typed by a cashier ("1150", "279.5",
    /// "40.05"). At most two decimals; `field` names the input in errors.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("tarjeta", "279.5").unwrap().cents(), 27950);
    /// assert!(Money::parse_decimal("tarjeta", "12.345").is_err());
    /// assert!(Money::parse_decimal("tarjeta", "").is_err());
    /// ```
    pub fn parse_decimal(field: &str, input: &str) -> Result<Money, ValidationError> {
        parse_fixed_point(field, input, 2).map(Money)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole units (lempiras or dollars), truncated toward zero.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0 / 100
    }

    /// The minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
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

    /// Plain decimal rendering without currency sign ("50.00", "-3.25").
    ///
    /// Used for query parameters and printed reports.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.units().abs(), self.cents_part())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Lempira rendering for logs and reports ("L 1,150.00" is left to the UI).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}L{}.{:02}", sign, self.units().abs(), self.cents_part())
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
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Lempiras per US dollar, in ten-thousandths (247_500 = L 24.7500).
///
/// Stored as a singleton in `precio_dolar` and read at close time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    pub const SCALE: i64 = 10_000;

    #[inline]
    pub const fn from_ten_thousandths(value: i64) -> Self {
        ExchangeRate(value)
    }

    /// Parses a rate such as "24.75" or "24.7513" (up to four decimals).
    pub fn parse_decimal(input: &str) -> Result<Self, ValidationError> {
        let value = parse_fixed_point("precio_dolar", input, 4)?;
        if value < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "precio_dolar".to_string(),
            });
        }
        Ok(ExchangeRate(value))
    }

    #[inline]
    pub const fn ten_thousandths(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        ExchangeRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Converts a dollar amount to lempiras, rounding half away from zero
    /// so that a negative variance converts to the mirror of a positive one.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::{ExchangeRate, Money};
    ///
    /// let rate = ExchangeRate::from_ten_thousandths(247_513);
    /// assert_eq!(rate.convert(Money::from_cents(100)).cents(), 2475);
    /// assert_eq!(rate.convert(Money::from_cents(-100)).cents(), -2475);
    /// ```
    pub fn convert(&self, usd: Money) -> Money {
        // i128 keeps cents * rate from overflowing on large amounts
        let product = usd.cents() as i128 * self.0 as i128;
        let half = (Self::SCALE / 2) as i128;
        let rounded = if product >= 0 {
            (product + half) / Self::SCALE as i128
        } else {
            (product - half) / Self::SCALE as i128
        };
        Money::from_cents(rounded as i64)
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        ExchangeRate::zero()
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / Self::SCALE, (self.0 % Self::SCALE).abs())
    }
}

// =============================================================================
// Fixed-point parsing
// =============================================================================

fn parse_fixed_point(field: &str, input: &str, decimals: u32) -> Result<i64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required(field));
    }

    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (digits, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(ValidationError::invalid_format(field, "expected a number"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid_format(field, "expected a number"));
    }
    if frac.len() > decimals as usize {
        return Err(ValidationError::invalid_format(
            field,
            format!("at most {} decimal places", decimals),
        ));
    }

    let scale = 10_i64.pow(decimals);
    let whole_value = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<i64>()
            .map_err(|_| ValidationError::invalid_format(field, "amount too large"))?
    };
    let frac_value = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded
            .parse::<i64>()
            .map_err(|_| ValidationError::invalid_format(field, "expected a number"))?
    };

    let value = whole_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| ValidationError::invalid_format(field, "amount too large"))?;

    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(115_050);
        assert_eq!(money.cents(), 115_050);
        assert_eq!(money.units(), 1150);
        assert_eq!(money.cents_part(), 50);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(5000).to_string(), "L50.00");
        assert_eq!(Money::from_cents(-325).to_string(), "-L3.25");
        assert_eq!(Money::from_cents(-325).to_decimal_string(), "-3.25");
        assert_eq!(Money::zero().to_decimal_string(), "0.00");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Money::parse_decimal("x", "1150").unwrap().cents(), 115_000);
        assert_eq!(Money::parse_decimal("x", " 40.05 ").unwrap().cents(), 4005);
        assert_eq!(Money::parse_decimal("x", ".5").unwrap().cents(), 50);
        assert_eq!(Money::parse_decimal("x", "-3.25").unwrap().cents(), -325);

        assert_eq!(
            Money::parse_decimal("efectivo", "  "),
            Err(ValidationError::required("efectivo"))
        );
        assert!(Money::parse_decimal("x", "1,150").is_err());
        assert!(Money::parse_decimal("x", "abc").is_err());
        assert!(Money::parse_decimal("x", ".").is_err());
        assert!(Money::parse_decimal("x", "99999999999999999999").is_err());
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let parts = [Money::from_cents(115_000), Money::from_cents(28_000), Money::from_cents(4_000)];
        let total: Money = parts.iter().sum();
        assert_eq!(total.cents(), 147_000);
        assert_eq!((-total).cents(), -147_000);
        assert_eq!((Money::from_cents(250) * 4).cents(), 1000);
    }

    #[test]
    fn test_exchange_rate_convert_rounds_half_away_from_zero() {
        // 0.50 USD * 24.7501 = 12.37505 -> 12.38
        let rate = ExchangeRate::from_ten_thousandths(247_501);
        assert_eq!(rate.convert(Money::from_cents(50)).cents(), 1238);
        assert_eq!(rate.convert(Money::from_cents(-50)).cents(), -1238);
        assert!(ExchangeRate::zero().convert(Money::from_cents(10_000)).is_zero());
    }

    #[test]
    fn test_exchange_rate_parse_and_display() {
        let rate = ExchangeRate::parse_decimal("24.75").unwrap();
        assert_eq!(rate.ten_thousandths(), 247_500);
        assert_eq!(rate.to_string(), "24.7500");
        assert!(ExchangeRate::parse_decimal("-1").is_err());
        assert!(ExchangeRate::parse_decimal("24.123456").is_err());
    }
}
