//! # Money Module
//!
//! Provides the `Money` type for monetary values in USD and Bs.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    3.335 × 3 = 10.004999999999999  → rounds to 10.00  ❌ WRONG!         │
//! │                                                                         │
//! │  With fixed-point decimals:                                             │
//! │    3.335 × 3 = 10.005 (exact)      → rounds to 10.01  ✅                │
//! │                                                                         │
//! │  List prices may carry three decimals, so integer cents cannot hold    │
//! │  them either. Every value is a `rust_decimal::Decimal` and rounding    │
//! │  (half-up, two places) happens only at explicit boundaries:            │
//! │    line subtotal → gross → discounted total → Bs conversion            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mercado_core::money::Money;
//! use rust_decimal::Decimal;
//!
//! let price = Money::new(Decimal::new(1099, 2));     // 10.99
//! let line = price.checked_mul_quantity(3).unwrap();  // 32.97
//! assert_eq!(line.to_string(), "32.97");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use crate::types::{DiscountPercent, ExchangeRate};

/// Number of decimal places every rounded amount carries.
pub const MONEY_SCALE: u32 = 2;

/// Rounds half-up (away from zero) to two decimal places.
///
/// ## Example
/// ```rust
/// use mercado_core::money::round_half_up;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_half_up(Decimal::new(10005, 3)), Decimal::new(1001, 2));
/// assert_eq!(round_half_up(Decimal::new(10004, 3)), Decimal::new(1000, 2));
/// ```
#[inline]
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount.
///
/// ## Design Decisions
/// - **Decimal, not f64**: no binary fraction drift across a computation chain
/// - **Unrounded construction**: a list price of 3.335 is kept as-is; only the
///   arithmetic helpers below round, and they always round to two places
/// - **Serialized as a string**: `"10.01"`, never a JSON float
///
/// ## Where Money Flows
/// ```text
/// Product.list_price ──► SaleItem.unit_price_usd ──► SaleItem.subtotal_usd
///                                                          │
///                         Σ subtotals ──► gross ──► discount ──► total_usd
///                                                                   │
///                                             × exchange_rate ──► total_bs
///
/// PaymentInput.amount_usd ──► Σ paid ──► compared against total_usd
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps a decimal value without rounding it.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns this amount rounded half-up to two places.
    #[inline]
    pub fn rounded(&self) -> Money {
        Money(round_half_up(self.0))
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is strictly greater than zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies a unit price by a quantity and rounds the line subtotal.
    ///
    /// Returns `None` when the product does not fit in a `Decimal`.
    ///
    /// ## Example
    /// ```rust
    /// use mercado_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let unit = Money::new(Decimal::new(3335, 3)); // 3.335
    /// assert_eq!(unit.checked_mul_quantity(3).unwrap().amount(), Decimal::new(1001, 2));
    /// assert!(Money::new(Decimal::MAX).checked_mul_quantity(2).is_none());
    /// ```
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Money> {
        self.0
            .checked_mul(Decimal::from(qty))
            .map(|line| Money(round_half_up(line)))
    }

    /// `self + other`, or `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Sums amounts, stopping at the first overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Applies a percentage discount and returns the rounded discounted amount.
    ///
    /// `round(amount × (1 − pct / 100), 2)`
    pub fn apply_percentage_discount(&self, discount: DiscountPercent) -> Money {
        let factor = Decimal::ONE - discount.percent() / Decimal::ONE_HUNDRED;
        Money(round_half_up(self.0 * factor))
    }

    /// Converts a USD amount to Bs at the given rate, rounded. `None` on
    /// overflow.
    pub fn checked_convert(&self, rate: ExchangeRate) -> Option<Money> {
        self.0
            .checked_mul(rate.value())
            .map(|bs| Money(round_half_up(bs)))
    }

    /// `self − other`, floored at zero (change due never goes negative).
    pub fn saturating_sub(&self, other: Money) -> Money {
        if self.0 > other.0 {
            Money(self.0 - other.0)
        } else {
            Money::zero()
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows at least two decimal places: `10` prints as `10.00`, `3.335` as
/// `3.335`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        if value.scale() < MONEY_SCALE {
            value.rescale(MONEY_SCALE);
        }
        write!(f, "{}", value)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money)
    }
}

/// Decimal TEXT columns are decoded through this impl.
impl TryFrom<String> for Money {
    type Error = rust_decimal::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
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
// Unit Tests
// =============================================================================
