//! # Money Module
//!
//! `Money` for monetary values and `Fraction` for rates in [0, 1].
//!
//! ## Why Integers?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Amounts carry two decimal places (prices, subtotals, totals).         │
//! │  Rates carry up to four decimal places (VAT 10.5 % = 0.1050).          │
//! │                                                                         │
//! │    Money(1099)     = 10.99        (cents)                               │
//! │    Fraction(2100)  = 0.21         (basis points, 1/10000)              │
//! │                                                                         │
//! │  Every multiplication rounds once, half away from zero, to the cent.   │
//! │  Arithmetic that leaves the i64 range yields `None`, never wraps.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use erp_core::money::{Fraction, Money};
//!
//! let price = Money::from_cents(10000);         // 100.00
//! let vat: Fraction = "0.21".parse().unwrap();  // 21 %
//! assert_eq!(price.calculate_tax(vat).unwrap().cents(), 2100);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use crate::error::ValidationError;

/// Basis points in a whole (1.00).
pub const BPS_PER_UNIT: u32 = 10_000;

/// Multiplies `amount` by `bps / 10000`, rounding half away from zero.
///
/// `None` when the result does not fit in an i64.
fn apply_bps(amount: i64, bps: u32) -> Option<i64> {
    let product = amount as i128 * bps as i128;
    let half = BPS_PER_UNIT as i128 / 2;
    let rounded = if product >= 0 {
        (product + half) / BPS_PER_UNIT as i128
    } else {
        (product - half) / BPS_PER_UNIT as i128
    };
    i64::try_from(rounded).ok()
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents (two decimal places).
///
/// Signed so credit notes and corrections can carry negative amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use erp_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
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

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
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
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity, `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Tax owed on this amount at the given rate.
    ///
    /// ```rust
    /// use erp_core::money::{Fraction, Money};
    ///
    /// // 10.00 at 10.5 % = 1.05
    /// let tax = Money::from_cents(1000).calculate_tax(Fraction::from_bps(1050));
    /// assert_eq!(tax.unwrap().cents(), 105);
    /// ```
    pub fn calculate_tax(&self, rate: Fraction) -> Option<Money> {
        apply_bps(self.0, rate.bps()).map(Money)
    }

    /// Returns the amount left after taking off `discount`.
    ///
    /// ```rust
    /// use erp_core::money::{Fraction, Money};
    ///
    /// let net = Money::from_cents(10000).apply_discount(Fraction::from_bps(1000));
    /// assert_eq!(net.unwrap().cents(), 9000);
    /// ```
    pub fn apply_discount(&self, discount: Fraction) -> Option<Money> {
        let off = apply_bps(self.0, discount.bps())?;
        self.0.checked_sub(off).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor())
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Fraction Type
// =============================================================================

/// A rate between 0.00 and 1.00, held in basis points.
///
/// Used for VAT rates and line discounts. Construction does not range-check;
/// [`crate::validation::validate_fraction`] does, so out-of-range input can
/// still be represented and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fraction(u32);

impl Fraction {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Fraction(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Fraction(0)
    }

    /// 1.00 (a full discount, or a 100 % rate).
    #[inline]
    pub const fn one() -> Self {
        Fraction(BPS_PER_UNIT)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns `1 - self`, saturating at zero.
    #[inline]
    pub const fn complement(&self) -> Self {
        Fraction(BPS_PER_UNIT.saturating_sub(self.0))
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Fraction::zero()
    }
}

/// Four decimal places: `0.2100`.
impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / BPS_PER_UNIT, self.0 % BPS_PER_UNIT)
    }
}

/// Parses decimal text such as `"0.21"`, `".5"`, `"1"` or `"0.105"`.
///
/// At most four decimals are accepted. Negative values are rejected here
/// since they cannot be held in basis points.
impl FromStr for Fraction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "fraction".to_string(),
            reason: reason.to_string(),
        };

        if s.starts_with('-') {
            return Err(ValidationError::OutOfRange {
                field: "fraction".to_string(),
                min: 0,
                max: 1,
            });
        }

        let (whole, decimals) = match s.split_once('.') {
            Some((w, d)) => (w, d),
            None => (s, ""),
        };

        if whole.is_empty() && decimals.is_empty() {
            return Err(invalid("empty value"));
        }
        if decimals.len() > 4 {
            return Err(invalid("at most 4 decimal places"));
        }
        if !whole.chars().chain(decimals.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid("must be a decimal number"));
        }

        let whole: u32 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("value too large"))?
        };
        let padded = format!("{:0<4}", decimals);
        let frac: u32 = padded.parse().map_err(|_| invalid("must be a decimal number"))?;

        whole
            .checked_mul(BPS_PER_UNIT)
            .and_then(|w| w.checked_add(frac))
            .map(Fraction)
            .ok_or_else(|| invalid("value too large"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
