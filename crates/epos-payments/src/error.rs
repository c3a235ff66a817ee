//! # Payment Error Types
//!
//! Error types for settlement and provider calls.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Payment Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Precondition   │  │    Gateway      │  │     Settlement          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Unsupported-   │  │  Declined       │  │  SettlementFailed       │ │
//! │  │   Currency      │  │  Unavailable    │  │   (split unwound)       │ │
//! │  │  AmountMismatch │  │  Transport      │  │                         │ │
//! │  │  Insufficient-  │  │  Timeout        │  │  ReversalFailed         │ │
//! │  │   Payment       │  │  InvalidResponse│  │   (manual follow-up)    │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Preconditions fail before any provider is contacted.                  │
//! │  ReversalFailed is never folded into another variant.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use epos_core::{CoreError, Money, Payment, PaymentMethod, ValidationError};
use thiserror::Error;

use crate::coordinator::Compensation;

/// Result type alias for payment operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

// =============================================================================
// Gateway Error
// =============================================================================

/// A failed provider call.
///
/// `Declined` is a business outcome: the provider answered and said no.
/// Every other variant is an infrastructure outcome where the provider's
/// answer is unknown or unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The provider answered and refused the payment.
    #[error("Payment declined by {provider}: {message}")]
    Declined { provider: String, message: String },

    /// The provider answered with a server error.
    #[error("{provider} is unavailable (HTTP {status})")]
    Unavailable { provider: String, status: u16 },

    /// The request never completed (DNS, connect, TLS, reset).
    #[error("Could not reach {provider}: {message}")]
    Transport { provider: String, message: String },

    /// The provider did not answer in time.
    #[error("{provider} did not answer within {after_ms} ms")]
    Timeout { provider: String, after_ms: u64 },

    /// The provider answered with something we cannot use.
    #[error("Unexpected response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },
}

impl GatewayError {
    /// True when the provider explicitly refused the payment.
    pub fn is_declined(&self) -> bool {
        matches!(self, GatewayError::Declined { .. })
    }

    /// Returns true if a fresh attempt may succeed.
    ///
    /// ## Retryable Errors
    /// - Provider server errors
    /// - Transport failures
    /// - Timeouts
    ///
    /// ## Non-Retryable Errors
    /// - Declines (the card said no)
    /// - Malformed responses
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Unavailable { .. }
                | GatewayError::Transport { .. }
                | GatewayError::Timeout { .. }
        )
    }

    /// Name of the provider that failed.
    pub fn provider(&self) -> &str {
        match self {
            GatewayError::Declined { provider, .. }
            | GatewayError::Unavailable { provider, .. }
            | GatewayError::Transport { provider, .. }
            | GatewayError::Timeout { provider, .. }
            | GatewayError::InvalidResponse { provider, .. } => provider,
        }
    }
}

// =============================================================================
// Reversal Failure
// =============================================================================

/// Everything an operator needs to reconcile a split payment that could not
/// be unwound.
#[derive(Debug)]
pub struct ReversalFailure {
    pub sale_id: String,
    /// The settled payment whose refund failed.
    pub payment: Payment,
    pub reason: String,
    /// The settlement failure that triggered compensation.
    pub cause: PaymentError,
    /// Legs already unwound before compensation stopped.
    pub reversed: Vec<Compensation>,
    /// Legs still standing, including `payment`.
    pub unreversed: Vec<Payment>,
}

impl ReversalFailure {
    /// Total still charged to the customer.
    pub fn outstanding(&self) -> Money {
        self.unreversed.iter().map(|p| p.amount).sum()
    }
}

impl fmt::Display for ReversalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not reverse {} payment {} of {} for sale {} ({}); {} still charged",
            self.payment.method.label(),
            self.payment.id,
            self.payment.amount,
            self.sale_id,
            self.reason,
            self.outstanding()
        )
    }
}

// =============================================================================
// Payment Error
// =============================================================================

/// Settlement error type.
#[derive(Debug, Error)]
pub enum PaymentError {
    // =========================================================================
    // Precondition Errors
    // =========================================================================
    /// Only GBP is settled.
    #[error("Only GBP is supported, got {0}")]
    UnsupportedCurrency(String),

    /// Split legs do not add up to the sale total.
    #[error("Split payment amounts ({provided}) do not match sale total ({expected})")]
    AmountMismatch { expected: Money, provided: Money },

    /// Less was tendered than is due.
    #[error("Payment of {provided} does not cover the total due of {due}")]
    InsufficientPayment { due: Money, provided: Money },

    /// The method cannot be settled in this flow.
    #[error("Payment method '{0}' is not supported here")]
    UnsupportedMethod(PaymentMethod),

    /// An amount failed validation.
    #[error("Invalid payment: {0}")]
    Validation(#[from] ValidationError),

    /// The sale cannot be settled in its current state.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Provider Errors
    // =========================================================================
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    // =========================================================================
    // Settlement Outcomes
    // =========================================================================
    /// A split leg failed and every earlier leg was unwound.
    #[error("Split payment failed at leg {step}: {cause}")]
    SettlementFailed {
        /// 1-based position of the failing leg.
        step: usize,
        cause: Box<PaymentError>,
        compensations: Vec<Compensation>,
    },

    /// A split leg failed and unwinding the earlier legs failed too.
    #[error("Reversal failed, manual reconciliation required: {0}")]
    ReversalFailed(Box<ReversalFailure>),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid payments configuration.
    #[error("Invalid payments configuration: {0}")]
    InvalidConfig(String),

    /// Selected provider has no credentials.
    #[error("No credentials configured for {0}")]
    MissingCredentials(String),
}

// =============================================================================
// Error Categorization
// =============================================================================

impl PaymentError {
    /// Returns true if the request was rejected before any provider call.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PaymentError::UnsupportedCurrency(_)
                | PaymentError::AmountMismatch { .. }
                | PaymentError::InsufficientPayment { .. }
                | PaymentError::Validation(_)
                | PaymentError::Core(_)
        )
    }

    /// Returns true if the operator may simply try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Gateway(e) => e.is_retryable(),
            PaymentError::SettlementFailed { cause, .. } => cause.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if money may be left charged with no automatic undo.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(self, PaymentError::ReversalFailed(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PaymentError::InvalidConfig(_) | PaymentError::MissingCredentials(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> GatewayError {
        GatewayError::Timeout {
            provider: "worldpay".into(),
            after_ms: 30_000,
        }
    }

    #[test]
    fn test_gateway_categories() {
        let declined = GatewayError::Declined {
            provider: "stripe".into(),
            message: "Your card was declined.".into(),
        };
        assert!(declined.is_declined());
        assert!(!declined.is_retryable());

        assert!(timeout().is_retryable());
        assert!(!timeout().is_declined());
        assert_eq!(timeout().provider(), "worldpay");

        let invalid = GatewayError::InvalidResponse {
            provider: "sumup".into(),
            message: "no reference".into(),
        };
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn test_settlement_failure_inherits_retryability() {
        let err = PaymentError::SettlementFailed {
            step: 2,
            cause: Box::new(PaymentError::Gateway(timeout())),
            compensations: Vec::new(),
        };
        assert!(err.is_retryable());
        assert!(!err.needs_reconciliation());
        assert!(err.to_string().contains("leg 2"));
    }

    #[test]
    fn test_precondition_errors() {
        assert!(PaymentError::UnsupportedCurrency("EUR".into()).is_precondition());
        assert!(PaymentError::AmountMismatch {
            expected: Money::from_pence(10000),
            provided: Money::from_pence(9000),
        }
        .is_precondition());
        assert!(!PaymentError::Gateway(timeout()).is_precondition());
    }

    #[test]
    fn test_reversal_failure_display() {
        let payment = Payment::approved(
            PaymentMethod::Card,
            Money::from_pence(6000),
            Some("pi_1".into()),
        );
        let failure = ReversalFailure {
            sale_id: "S-1".into(),
            payment: payment.clone(),
            reason: "refund declined".into(),
            cause: PaymentError::Gateway(timeout()),
            reversed: Vec::new(),
            unreversed: vec![payment],
        };
        let err = PaymentError::ReversalFailed(Box::new(failure));

        assert!(err.needs_reconciliation());
        let text = err.to_string();
        assert!(text.contains("manual reconciliation"));
        assert!(text.contains("£60.00 still charged"));
    }
}
