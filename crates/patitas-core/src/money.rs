//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    All prices, taxes and totals are i64 cents; only display layers      │
//! │    convert to decimal strings.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locale-Tolerant Parsing
//! Inbound request bodies carry amounts as strings, sometimes with
//! thousands separators in either convention ("1.000,50" or "1,000.50").
//! [`Money::parse`] coerces these to canonical cents. Malformed input
//! coerces to zero so the validation pass can reject it with a proper
//! field-referencing error instead of a panic deep in pricing code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 1900 bps = 19%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds and return lines
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the larger of two values.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// Calculates tax on this amount.
    ///
    /// ## Implementation
    /// Integer math with half-up rounding: `(amount * bps + 5000) / 10000`.
    /// i128 intermediate prevents overflow on large amounts.
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Parses a possibly locale-formatted decimal string into Money.
    ///
    /// ## Accepted Shapes
    /// ```text
    /// "2000"      → 200000 cents
    /// "1000.50"   → 100050 cents
    /// "1.000,50"  → 100050 cents   (EU convention)
    /// "1,000.50"  → 100050 cents   (US convention)
    /// "1.000"     → 100000 cents   (lone separator + 3 digits = thousands)
    /// ```
    ///
    /// Malformed input returns `Money::zero()`, never an error: the
    /// composer applies its own validation pass (positive price, etc.)
    /// and rejects zeroed amounts there with a field-referencing message.
    pub fn parse(raw: &str) -> Money {
        let trimmed: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if trimmed.is_empty() {
            return Money::zero();
        }

        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.as_str()),
        };

        if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
            return Money::zero();
        }

        let last_dot = body.rfind('.');
        let last_comma = body.rfind(',');

        // Decide which separator (if any) marks the decimal point.
        let decimal_pos = match (last_dot, last_comma) {
            (Some(d), Some(c)) => Some(d.max(c)),
            (Some(p), None) => single_separator_decimal_pos(body, p, '.'),
            (None, Some(p)) => single_separator_decimal_pos(body, p, ','),
            (None, None) => None,
        };

        let (int_part, frac_part) = match decimal_pos {
            Some(pos) => (&body[..pos], &body[pos + 1..]),
            None => (body, ""),
        };

        // Strip grouping separators from the integer part.
        let digits: String = int_part.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() && frac_part.is_empty() {
            return Money::zero();
        }
        // A separator inside the fractional part is malformed.
        if !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return Money::zero();
        }

        let units: i64 = match digits.parse() {
            Ok(n) => n,
            Err(_) => return Money::zero(), // overflow
        };

        // Fraction: first two digits are cents, third digit rounds half-up.
        let mut frac_digits = frac_part.chars();
        let tens = frac_digits.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
        let ones = frac_digits.next().and_then(|c| c.to_digit(10)).unwrap_or(0) as i64;
        let round_up = frac_digits
            .next()
            .and_then(|c| c.to_digit(10))
            .map(|d| d >= 5)
            .unwrap_or(false);

        let mut cents = match units.checked_mul(100) {
            Some(n) => n + tens * 10 + ones,
            None => return Money::zero(),
        };
        if round_up {
            cents += 1;
        }

        Money::from_cents(if negative { -cents } else { cents })
    }
}

/// Classifies the lone separator in a numeric string.
///
/// A single separator followed by exactly three digits is read as a
/// thousands separator ("1.000" = 1000); one or two trailing digits make
/// it a decimal point ("10.5" = 10.50). More than one occurrence of the
/// same separator is always grouping.
fn single_separator_decimal_pos(body: &str, pos: usize, sep: char) -> Option<usize> {
    if body.matches(sep).count() > 1 {
        return None;
    }
    let tail = &body[pos + 1..];
    if tail.len() == 3 && tail.chars().all(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(pos)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// For debugging and audit notes; UI layers format for locale themselves.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.units().abs(), self.cents_part())
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
