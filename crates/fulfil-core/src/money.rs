//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  travel fee 132.70 × 0.70 in floating point:                           │
//! │    92.88999999999999  ❌ which cent does the driver get?               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + Basis Points                            │
//! │    13270 cents × 7000 bps / 10000 = 9289 cents (R92.89)               │
//! │    platform keeps 13270 - 9289 = 3981 cents (R39.81)                   │
//! │    The two halves ALWAYS add back up to the fee                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use fulfil_core::money::{Money, Rate};
//!
//! let subtotal = Money::from_cents(20_000);       // R200.00
//! let vat = subtotal.apply_rate(Rate::from_bps(1500));
//! assert_eq!(vat.cents(), 3_000);                 // R30.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents (ZAR).
///
/// ## Design Decisions
/// - **i64 (signed)**: wallet debits and reversals are negative amounts
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  OrderItem.unit_price × quantity ──► Order.subtotal ──► VAT            │
/// │                                                                         │
/// │  FeeSchedule.quote(distance) ──► Order.travel_fee ──► driver earning   │
/// │                                                                         │
/// │  missing item ──► refund ──► Wallet ──► Withdrawal (gross, fee, net)   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::money::Money;
    ///
    /// let price = Money::from_cents(1899); // R18.99
    /// assert_eq!(price.cents(), 1899);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from rands and cents.
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -R5.50.
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

    /// Returns the whole-rand portion.
    #[inline]
    pub const fn rands(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
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

    /// Applies a basis-point rate, rounding half away from zero to the cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps ± 5000) / 10000`. The ±5000 is half of the
    /// divisor, so a remainder of exactly half a cent rounds away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::money::{Money, Rate};
    ///
    /// let fee = Money::from_cents(13_270);              // R132.70
    /// let driver = fee.apply_rate(Rate::from_bps(7000)); // 70%
    /// assert_eq!(driver.cents(), 9_289);                // R92.89
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        let rounded = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        Money::from_cents(rounded as i64)
    }

    /// Splits the value into `(share, remainder)` where `share` is this
    /// amount at `rate` and `remainder` is whatever is left.
    ///
    /// `share + remainder == self` holds exactly for every input.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::money::{Money, Rate};
    ///
    /// let (driver, platform) = Money::from_cents(13_270).split(Rate::from_bps(7000));
    /// assert_eq!(driver.cents(), 9_289);
    /// assert_eq!(platform.cents(), 3_981);
    /// ```
    pub fn split(&self, rate: Rate) -> (Money, Money) {
        let share = self.apply_rate(rate);
        (share, *self - share)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use fulfil_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(3250); // R32.50
    /// assert_eq!(unit_price.multiply_quantity(2).cents(), 6500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A proportion in basis points (1 bps = 0.01%).
///
/// Used for VAT (1500 = 15%), the driver share of the travel fee (7000 = 70%)
/// and the withdrawal processing fee (300 = 3%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100% in basis points.
    pub const WHOLE_BPS: u32 = 10_000;

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (for configuration convenience).
    pub fn from_percentage(pct: f64) -> Self {
        Rate((pct * 100.0).round() as u32)
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

    /// Returns `100% - self`, saturating at zero.
    #[inline]
    pub const fn complement(&self) -> Self {
        Rate(Self::WHOLE_BPS.saturating_sub(self.0))
    }

    /// Checks the rate does not exceed 100%.
    #[inline]
    pub const fn is_proportion(&self) -> bool {
        self.0 <= Self::WHOLE_BPS
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as rands, e.g. `R132.70` or `-R5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}R{}.{:02}", sign, self.rands().abs(), self.cents_part())
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
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
