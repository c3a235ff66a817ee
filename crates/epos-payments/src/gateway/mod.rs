//! # Payment Gateway
//!
//! One charge/refund contract over every card provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PaymentGateway contract                           │
//! │                                                                         │
//! │  charge(amount, "GBP")                                                 │
//! │    ├── Ok(Payment { status: approved, reference, processed_at })       │
//! │    └── Err(UnsupportedCurrency | Validation | Gateway(..))             │
//! │                                                                         │
//! │  refund(amount, reference, "GBP")                                      │
//! │    ├── Ok(RefundResult { success: true,  .. })                         │
//! │    ├── Ok(RefundResult { success: false, .. })  ◄── provider said no,  │
//! │    │                                               or never answered   │
//! │    └── Err(..)  ◄── only for bad arguments, before any call            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A refund never turns a provider or transport failure into an `Err`: it is
//! called while unwinding a failed split, and the caller decides what a
//! failed refund means.

use async_trait::async_trait;
use chrono::Utc;
use epos_core::{Money, Payment, CURRENCY_CODE};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, PaymentResult};

pub mod http;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

/// Outcome of a refund request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub success: bool,
    /// Provider refund reference, or a local placeholder when the provider
    /// gave none.
    pub reference: String,
    pub error_message: Option<String>,
}

impl RefundResult {
    pub fn succeeded(reference: impl Into<String>) -> Self {
        RefundResult {
            success: true,
            reference: reference.into(),
            error_message: None,
        }
    }

    /// A refund that never reached a verdict, tagged `ERROR-{millis}`.
    pub fn failed(message: impl Into<String>) -> Self {
        RefundResult {
            success: false,
            reference: format!("ERROR-{}", Utc::now().timestamp_millis()),
            error_message: Some(message.into()),
        }
    }
}

/// A card payment provider.
///
/// Implementations hold no per-sale state, so one instance is shared by
/// every sale for the life of the process.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Takes `amount` from the customer's card.
    ///
    /// The returned payment is recorded as a card payment; callers settling
    /// a contactless tap overwrite the method.
    async fn charge(&self, amount: Money, currency: &str) -> PaymentResult<Payment>;

    /// Returns `amount` against the charge identified by `reference`.
    async fn refund(
        &self,
        amount: Money,
        reference: &str,
        currency: &str,
    ) -> PaymentResult<RefundResult>;
}

/// Rejects anything but GBP.
pub fn ensure_gbp(currency: &str) -> PaymentResult<()> {
    if currency != CURRENCY_CODE {
        return Err(PaymentError::UnsupportedCurrency(currency.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_gbp() {
        assert!(ensure_gbp("GBP").is_ok());
        assert!(matches!(
            ensure_gbp("EUR"),
            Err(PaymentError::UnsupportedCurrency(c)) if c == "EUR"
        ));
    }

    #[test]
    fn test_failed_refund_reference() {
        let result = RefundResult::failed("connection reset");
        assert!(!result.success);
        assert!(result.reference.starts_with("ERROR-"));
        assert_eq!(result.error_message.as_deref(), Some("connection reset"));
    }
}
