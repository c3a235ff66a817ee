//! # Money Module
//!
//! Provides the `Money` type for handling GBP amounts safely.
//!
//! ## Why Integer Pence?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A split of £99.99 as 50.00 + 49.99 summed in floats can miss the      │
//! │  sale total by a rounding hair and fail the tolerance check.           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Pence                                            │
//! │    5000 + 4999 = 9999 pence, exactly.                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decimal pounds only appear at the edges: parsing operator input,
//! formatting receipts, and provider payloads that want major units.
//!
//! ## Usage
//! ```rust
//! use epos_core::money::Money;
//!
//! let price = Money::from_pence(1099); // £10.99
//! let total = price + Money::from_pence(500);
//! assert_eq!(total.to_string(), "£15.99");
//!
//! let tendered = Money::parse_pounds("20.00").unwrap();
//! assert_eq!((tendered - total).pence(), 401);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A GBP amount in pence.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for differences and refunds
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serializes as pence**: the frontend divides by 100 for display
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► SaleItem.unit_price ──► SaleItem.line_total          │
/// │                           │                                             │
/// │                           └──► calculate_vat ──► SaleItem.vat_amount    │
/// │                                                                         │
/// │  Sale.subtotal + Sale.vat_amount ──► Sale.total ──► Payment.amount     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from pence.
    ///
    /// ## Example
    /// ```rust
    /// use epos_core::money::Money;
    ///
    /// let price = Money::from_pence(1099); // £10.99
    /// assert_eq!(price.pence(), 1099);
    /// ```
    #[inline]
    pub const fn from_pence(pence: i64) -> Self {
        Money(pence)
    }

    /// Creates a Money value from pounds and pence.
    ///
    /// For negative amounts only the pounds part carries the sign:
    /// `from_pounds_pence(-5, 50)` is -£5.50.
    #[inline]
    pub const fn from_pounds_pence(pounds: i64, pence: i64) -> Self {
        if pounds < 0 {
            Money(pounds * 100 - pence)
        } else {
            Money(pounds * 100 + pence)
        }
    }

    /// Parses a decimal pound amount typed by an operator.
    ///
    /// Accepts an optional leading `£`, up to two decimal places, and no
    /// sign. Anything else is rejected rather than rounded.
    ///
    /// ## Example
    /// ```rust
    /// use epos_core::money::Money;
    ///
    /// assert_eq!(Money::parse_pounds("12").unwrap().pence(), 1200);
    /// assert_eq!(Money::parse_pounds("£49.99").unwrap().pence(), 4999);
    /// assert_eq!(Money::parse_pounds("0.5").unwrap().pence(), 50);
    /// assert!(Money::parse_pounds("1.999").is_err());
    /// assert!(Money::parse_pounds("-3").is_err());
    /// ```
    pub fn parse_pounds(input: &str) -> Result<Self, ValidationError> {
        let raw = input.trim();
        let digits = raw.strip_prefix('£').unwrap_or(raw);

        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("'{}' {}", raw, reason),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("is not an amount"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("must be a plain pound amount like 12.50"));
        }
        if frac.len() > 2 {
            return Err(invalid("has more than two decimal places"));
        }

        let pounds: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("is too large"))?
        };
        let pence: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid("is not an amount"))? * 10,
            _ => frac.parse().map_err(|_| invalid("is not an amount"))?,
        };

        pounds
            .checked_mul(100)
            .and_then(|p| p.checked_add(pence))
            .map(Money)
            .ok_or_else(|| invalid("is too large"))
    }

    /// Returns the value in pence.
    #[inline]
    pub const fn pence(&self) -> i64 {
        self.0
    }

    /// Returns the whole pounds portion.
    #[inline]
    pub const fn pounds(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the pence portion (always 0-99).
    #[inline]
    pub const fn pence_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns the amount in major units for provider payloads that want
    /// decimal pounds. Never feed the result back into arithmetic.
    #[inline]
    pub fn to_major_units(&self) -> f64 {
        self.0 as f64 / 100.0
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

    /// Returns `|self - other|`.
    #[inline]
    pub const fn abs_diff(&self, other: Money) -> Money {
        Money((self.0 - other.0).abs())
    }

    /// Calculates VAT on this amount, rounding half up to the penny.
    ///
    /// ## Implementation
    /// Integer math in basis points: `(pence * bps + 5000) / 10000`.
    /// The +5000 is the half-penny that makes the division round.
    ///
    /// ## Example
    /// ```rust
    /// use epos_core::money::Money;
    /// use epos_core::types::TaxRate;
    ///
    /// let price = Money::from_pence(999);    // £9.99
    /// let rate = TaxRate::from_bps(2000);    // 20%
    ///
    /// // £9.99 × 20% = £1.998 → £2.00
    /// assert_eq!(price.calculate_vat(rate).pence(), 200);
    /// ```
    pub fn calculate_vat(&self, rate: TaxRate) -> Money {
        // i128 so a large amount times 10000 bps cannot overflow
        let vat = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_pence(vat as i64)
    }
}

// =============================================================================
// Checked Arithmetic
// =============================================================================

impl Money {
    /// Adds, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(pence) => Some(Money(pence)),
            None => None,
        }
    }

    /// Subtracts, returning `None` on overflow.
    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(pence) => Some(Money(pence)),
            None => None,
        }
    }

    /// Sums an iterator, returning `None` if any step overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(iter: I) -> Option<Money> {
        iter.into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders as `£12.34` / `-£5.50`, the format used on receipts.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}£{}.{:02}", sign, self.pounds().abs(), self.pence_part())
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
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
