//! # Error Types
//!
//! Domain-specific error types for epos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  epos-core errors (this file)                                          │
//! │  ├── CoreError        - Sale aggregate rule violations                 │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  epos-payments errors (separate crate)                                 │
//! │  ├── GatewayError     - Provider declined / unreachable / timed out    │
//! │  └── PaymentError     - Settlement and reversal outcomes               │
//! │                                                                         │
//! │  Terminal errors (in app)                                              │
//! │  └── ApiError         - What the operator sees                         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PaymentError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::SaleStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Sale aggregate errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No line item with this id in the sale.
    #[error("Item not found in sale: {0}")]
    ItemNotFound(String),

    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Adding items to a completed sale
    /// - Completing a sale that was cancelled
    /// - Cancelling a sale that already settled
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: SaleStatus,
    },

    /// Sale has reached the item limit.
    #[error("Sale cannot have more than {max} items")]
    SaleTooLarge { max: usize },

    /// Nothing to pay for.
    #[error("Sale has no items")]
    EmptySale,

    /// Every line is free, so there is no amount to take a payment for.
    #[error("Sale total is {0}; nothing to pay")]
    ZeroTotal(crate::money::Money),

    /// Totals would not fit in the money type.
    #[error("Sale totals overflow")]
    AmountOverflow,

    /// A sale cannot be completed without at least one payment.
    #[error("Sale {0} has no payments")]
    NoPayments(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. an amount with three decimal places).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidSaleStatus {
            sale_id: "S-1".to_string(),
            current_status: SaleStatus::Completed,
        };
        assert_eq!(
            err.to_string(),
            "Sale S-1 is completed, cannot perform operation"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        assert_eq!(err.to_string(), "amount must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "product id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
