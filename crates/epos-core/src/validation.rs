//! # Validation Module
//!
//! Input validation for values that enter a sale or a payment.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Terminal input parsing                                       │
//! │  ├── Amounts parsed with Money::parse_pounds                           │
//! │  └── Methods parsed with PaymentMethod::from_str                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE: Business rule validation                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Settlement preconditions (epos-payments)                     │
//! │  ├── Currency must be GBP                                              │
//! │  └── Split legs must sum to the total                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::TaxRate;
use crate::{MAX_SALE_ITEMS, MAX_UNIT_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product id coming off the POS grid.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use epos_core::validation::validate_product_id;
///
/// assert!(validate_product_id("COKE-330").is_ok());
/// assert!(validate_product_id("").is_err());
/// assert!(validate_product_id("has space").is_err());
/// ```
pub fn validate_product_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "product id".to_string(),
        });
    }

    if id.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "product id".to_string(),
            max: 50,
        });
    }

    if !id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "product id".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name printed on the receipt.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Money Validators
// =============================================================================

/// Validates a unit price. Zero is allowed (free items); anything above
/// [`MAX_UNIT_PRICE`] is rejected.
///
/// ## Example
/// ```rust
/// use epos_core::money::Money;
/// use epos_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_pence(999)).is_ok());
/// assert!(validate_price(Money::zero()).is_ok());
/// assert!(validate_price(Money::from_pence(-1)).is_err());
/// assert!(validate_price(Money::from_pence(100_000_001)).is_err());
/// ```
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() || price > MAX_UNIT_PRICE {
        return Err(ValidationError::OutOfRange {
            field: "price (pence)".to_string(),
            min: 0,
            max: MAX_UNIT_PRICE.pence(),
        });
    }

    Ok(())
}

/// Validates a payment amount. Payments are always strictly positive.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a VAT rate: 0% to 100%.
pub fn validate_tax_rate(rate: TaxRate) -> ValidationResult<()> {
    if rate.bps() > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "vat rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more line item fits in the sale.
pub fn validate_sale_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_SALE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "sale items".to_string(),
            min: 0,
            max: MAX_SALE_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_id() {
        assert!(validate_product_id("1").is_ok());
        assert!(validate_product_id("COKE-330").is_ok());
        assert!(validate_product_id("product_1").is_ok());

        assert!(validate_product_id("").is_err());
        assert!(validate_product_id("   ").is_err());
        assert!(validate_product_id("has space").is_err());
        assert!(validate_product_id(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Flat White").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_price_bounds() {
        assert!(validate_price(Money::zero()).is_ok());
        assert!(validate_price(MAX_UNIT_PRICE).is_ok());
        assert!(validate_price(Money::from_pence(-1)).is_err());
        assert!(matches!(
            validate_price(MAX_UNIT_PRICE + Money::from_pence(1)),
            Err(ValidationError::OutOfRange { max: 100_000_000, .. })
        ));
        assert!(validate_price(Money::from_pence(i64::MAX)).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(Money::from_pence(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_payment_amount(Money::from_pence(-1000)).is_err());
    }

    #[test]
    fn test_validate_tax_rate() {
        assert!(validate_tax_rate(TaxRate::zero()).is_ok());
        assert!(validate_tax_rate(TaxRate::from_percent(20)).is_ok());
        assert!(validate_tax_rate(TaxRate::from_bps(10000)).is_ok());
        assert!(validate_tax_rate(TaxRate::from_bps(10001)).is_err());
    }

    #[test]
    fn test_validate_sale_size() {
        assert!(validate_sale_size(0).is_ok());
        assert!(validate_sale_size(MAX_SALE_ITEMS - 1).is_ok());
        assert!(validate_sale_size(MAX_SALE_ITEMS).is_err());
    }
}
