//! # Money Module
//!
//! Integer-cent money and the shared rounding / clamping primitives used by
//! the import pipeline, the cost roll-up and the BOM resolver.
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
//! │    Quantities and percentages may be fractional, but every money       │
//! │    result is rounded back to whole cents exactly once per step.        │
//! │                                                                         │
//! │    qty 2.5 × 333¢ = 832.5 → round_cents → 833¢                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use costbook_core::money::{clamp, round_cents, Money};
//!
//! assert_eq!(round_cents(832.5), 833);
//! assert_eq!(round_cents(f64::NAN), 0);
//! assert_eq!(clamp(f64::INFINITY, 0.0, 100.0), 0.0);
//!
//! let unit = Money::from_cents(333);
//! assert_eq!(unit.times(2.5).cents(), 833);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

// =============================================================================
// Rounding & Clamping Primitives
// =============================================================================

/// Rounds a fractional cent amount to whole cents.
///
/// ## Rules
/// - Non-finite input (`NaN`, `±∞`) becomes `0`
/// - Halves round away from zero (`0.5 → 1`, `-0.5 → -1`), never to even
/// - Results outside the `i64` range saturate
#[inline]
pub fn round_cents(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    value.round() as i64
}

/// Clamps `value` into `[lo, hi]`.
///
/// Non-finite input collapses to `lo`, so a corrupt percentage can never
/// inflate a price.
#[inline]
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if !value.is_finite() {
        return lo;
    }
    value.max(lo).min(hi)
}

/// Clamps a quantity-like value to `[0, +∞)`; non-finite becomes `0`.
#[inline]
pub fn non_negative(value: f64) -> f64 {
    clamp(value, 0.0, f64::MAX)
}

/// Applies a percentage to an amount: `round(amount × pct / 100)`.
#[inline]
pub fn percent_of(amount_cents: i64, pct: f64) -> i64 {
    round_cents(amount_cents as f64 * pct / 100.0)
}

// =============================================================================
// Rounding Mode
// =============================================================================

/// Direction used when snapping a price to a rounding increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Nearest increment, halves away from zero.
    #[default]
    Nearest,
    /// Always round up to the next increment.
    Up,
    /// Always round down to the previous increment.
    Down,
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: profit can legitimately be negative when markup is
///   overridden downstream, so the type itself does not forbid it
/// - **Single field tuple struct**: zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use costbook_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates Money from a fractional cent amount using [`round_cents`].
    #[inline]
    pub fn from_fractional_cents(cents: f64) -> Self {
        Money(round_cents(cents))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Clamps negative amounts to zero.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Multiplies by a fractional quantity and rounds back to cents.
    ///
    /// ## Example
    /// ```rust
    /// use costbook_core::money::Money;
    ///
    /// // 1.5 kg of flour at $2.99/kg
    /// let line = Money::from_cents(299).times(1.5);
    /// assert_eq!(line.cents(), 449); // 448.5 rounds up
    /// ```
    #[inline]
    pub fn times(&self, quantity: f64) -> Money {
        Money(round_cents(self.0 as f64 * quantity))
    }

    /// Returns `pct` percent of this amount, rounded to cents.
    ///
    /// ## Example
    /// ```rust
    /// use costbook_core::money::Money;
    ///
    /// let base = Money::from_cents(1100);
    /// assert_eq!(base.percent(10.0).cents(), 110);
    /// ```
    #[inline]
    pub fn percent(&self, pct: f64) -> Money {
        Money(percent_of(self.0, pct))
    }

    /// Snaps this amount to a multiple of `increment_cents`.
    ///
    /// ## Rounding Increments
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  increment = 5¢                                                    │
    /// │                                                                     │
    /// │  Nearest:  1232 → 1230    1233 → 1235    1235 → 1235               │
    /// │  Up:       1231 → 1235                                              │
    /// │  Down:     1234 → 1230                                              │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// An increment of 1 or less leaves the amount unchanged.
    pub fn round_to_increment(&self, increment_cents: i64, mode: RoundingMode) -> Money {
        if increment_cents <= 1 {
            return *self;
        }

        let inc = increment_cents as i128;
        let value = self.0 as i128;
        let floor = value.div_euclid(inc) * inc;
        let remainder = value - floor;

        let snapped = match mode {
            RoundingMode::Down => floor,
            RoundingMode::Up => {
                if remainder == 0 {
                    floor
                } else {
                    floor + inc
                }
            }
            RoundingMode::Nearest => {
                // Halves go away from zero
                let twice = remainder * 2;
                if twice > inc || (twice == inc && value >= 0) {
                    floor + inc
                } else {
                    floor
                }
            }
        };

        Money(snapped.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows money in a plain debugging format.
///
/// Currency-aware formatting belongs to the UI layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
