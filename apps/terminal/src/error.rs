//! # Operator Error Type
//!
//! Unified error type for terminal commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Terminal                           │
//! │                                                                         │
//! │  operator types `split card:60 card:40`                                 │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Sale Error? ──── CoreError::EmptySale ────────┐                │  │
//! │  │         │                                      │                │  │
//! │  │         ▼                                      ▼                │  │
//! │  │  Payment Error? ── PaymentError::Gateway ──── ApiError ────────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  printed as: [PaymentDeclined] Payment declined by stripe: ...         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `REVERSAL_FAILED` is its own code and is never folded into a general
//! payment error: it means money may still be held and someone has to look.

use epos_core::CoreError;
use epos_payments::{GatewayError, PaymentError};
use serde::Serialize;

/// Error returned from terminal commands.
///
/// ## Serialization
/// ```json
/// {
///   "code": "AMOUNT_MISMATCH",
///   "message": "Split payment amounts (£90.00) do not match sale total (£100.00)"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for operator-facing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Line item not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Sale is in the wrong state for the request
    BusinessLogic,

    /// Sale limits (empty sale, too many items)
    SaleError,

    /// Payment could not be taken (unsupported method, no payments)
    PaymentError,

    /// The card provider refused the payment
    PaymentDeclined,

    /// The card provider could not be reached or answered badly
    GatewayUnavailable,

    /// Split amounts do not add up to the total
    AmountMismatch,

    /// Less tendered than due
    InsufficientPayment,

    /// A payment is being taken; the sale cannot change
    SettlementInProgress,

    /// A split failed and could not be unwound
    ReversalFailed,

    /// Payments configuration is unusable
    ConfigError,

    /// Anything else
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn settlement_in_progress() -> Self {
        ApiError::new(
            ErrorCode::SettlementInProgress,
            "A payment is being taken; wait for it to finish",
        )
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ItemNotFound(id) => ApiError::not_found("Item", &id),
            CoreError::InvalidSaleStatus { .. } => {
                ApiError::new(ErrorCode::BusinessLogic, err.to_string())
            }
            CoreError::SaleTooLarge { .. }
            | CoreError::EmptySale
            | CoreError::ZeroTotal(_)
            | CoreError::AmountOverflow => {
                ApiError::new(ErrorCode::SaleError, err.to_string())
            }
            CoreError::NoPayments(_) => ApiError::new(ErrorCode::PaymentError, err.to_string()),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

fn gateway_code(err: &GatewayError) -> ErrorCode {
    if err.is_declined() {
        ErrorCode::PaymentDeclined
    } else {
        ErrorCode::GatewayUnavailable
    }
}

/// Converts settlement errors to API errors.
impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Core(e) => e.into(),
            PaymentError::Validation(e) => ApiError::validation(e.to_string()),
            PaymentError::UnsupportedCurrency(_) => ApiError::validation(err.to_string()),
            PaymentError::AmountMismatch { .. } => {
                ApiError::new(ErrorCode::AmountMismatch, err.to_string())
            }
            PaymentError::InsufficientPayment { .. } => {
                ApiError::new(ErrorCode::InsufficientPayment, err.to_string())
            }
            PaymentError::UnsupportedMethod(_) => {
                ApiError::new(ErrorCode::PaymentError, err.to_string())
            }
            PaymentError::Gateway(ref g) => ApiError::new(gateway_code(g), err.to_string()),
            PaymentError::SettlementFailed { ref cause, .. } => {
                let code = match cause.as_ref() {
                    PaymentError::Gateway(g) => gateway_code(g),
                    _ => ErrorCode::PaymentError,
                };
                ApiError::new(
                    code,
                    format!("{}. Earlier payments were reversed.", err),
                )
            }
            PaymentError::ReversalFailed(_) => {
                ApiError::new(ErrorCode::ReversalFailed, err.to_string())
            }
            PaymentError::InvalidConfig(_) | PaymentError::MissingCredentials(_) => {
                ApiError::new(ErrorCode::ConfigError, err.to_string())
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
