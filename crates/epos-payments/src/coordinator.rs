//! # Split Payment Coordinator
//!
//! Settles one sale across several payment methods, or leaves nothing
//! charged.
//!
//! ## Settlement State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   VALIDATE ──── Σ legs ≠ total ±1p ────► AmountMismatch (no calls)     │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │   SETTLE leg 1 ─► leg 2 ─► … ─► leg n ───────────────► Ok(payments)    │
//! │      │  card / contactless: gateway.charge                              │
//! │      │  cash / voucher:     approved locally                            │
//! │      │                                                                  │
//! │      │ leg k fails                                                      │
//! │      ▼                                                                  │
//! │   COMPENSATE legs 1..k-1 in the order they were taken                  │
//! │      │  card / contactless: gateway.refund                              │
//! │      │  cash / voucher:     recorded, nothing external to undo          │
//! │      │                                                                  │
//! │      ├── every refund accepted ──► SettlementFailed { step: k }        │
//! │      └── a refund refused ───────► ReversalFailed  (stop, escalate)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Legs run strictly one after another: leg k+1 is not started until leg k
//! has resolved, and compensation replays the same order.

use std::sync::Arc;

use epos_core::validation::validate_payment_amount;
use epos_core::{
    Money, Payment, PaymentMethod, Sale, SplitPaymentItem, CURRENCY_CODE, SPLIT_TOLERANCE,
};
use tracing::{debug, error, info, warn};

use crate::error::{PaymentError, PaymentResult, ReversalFailure};
use crate::gateway::PaymentGateway;
use crate::RECONCILIATION_TARGET;

// =============================================================================
// Compensation Records
// =============================================================================

/// What was done to unwind one settled leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationAction {
    /// The provider accepted a refund.
    Refunded { refund_reference: String },
    /// No provider charge to undo; the reversal is only recorded.
    Recorded,
}

/// An unwound leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compensation {
    pub payment: Payment,
    pub action: CompensationAction,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Drives a split payment through the gateway.
///
/// Holds no per-sale state; one coordinator serves every sale.
#[derive(Clone)]
pub struct SplitPaymentCoordinator {
    gateway: Arc<dyn PaymentGateway>,
}

impl SplitPaymentCoordinator {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        SplitPaymentCoordinator { gateway }
    }

    /// Checks a split against the sale without settling anything.
    ///
    /// ## Errors
    /// - `Core` if the sale is not pending or has no items
    /// - `AmountMismatch` if the legs are more than a penny off the total
    /// - `Validation` if any leg is zero or negative
    pub fn validate(&self, sale: &Sale, items: &[SplitPaymentItem]) -> PaymentResult<()> {
        sale.ensure_payable()?;

        let provided: Money = items.iter().map(|i| i.amount).sum();
        if provided.abs_diff(sale.total) > SPLIT_TOLERANCE {
            return Err(PaymentError::AmountMismatch {
                expected: sale.total,
                provided,
            });
        }

        for item in items {
            validate_payment_amount(item.amount)?;
        }

        Ok(())
    }

    /// Settles every leg in order and returns the payments in the same
    /// order.
    ///
    /// On failure every leg already settled is unwound before returning.
    /// The sale itself is not modified; the caller completes it.
    pub async fn settle(
        &self,
        sale: &Sale,
        items: &[SplitPaymentItem],
    ) -> PaymentResult<Vec<Payment>> {
        self.validate(sale, items)?;

        debug!(
            sale_id = %sale.id,
            total = %sale.total,
            legs = items.len(),
            provider = self.gateway.name(),
            "Starting split payment"
        );

        let mut settled: Vec<Payment> = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let step = index + 1;
            match self.settle_leg(item).await {
                Ok(payment) => {
                    debug!(
                        sale_id = %sale.id,
                        step,
                        method = %payment.method,
                        amount = %payment.amount,
                        "Split leg settled"
                    );
                    settled.push(payment);
                }
                Err(cause) => {
                    warn!(
                        sale_id = %sale.id,
                        step,
                        method = %item.method,
                        amount = %item.amount,
                        error = %cause,
                        "Split leg failed, unwinding earlier legs"
                    );
                    return Err(self.compensate(sale, step, cause, settled).await);
                }
            }
        }

        info!(
            sale_id = %sale.id,
            total = %sale.total,
            legs = settled.len(),
            "Split payment settled"
        );
        Ok(settled)
    }

    async fn settle_leg(&self, item: &SplitPaymentItem) -> PaymentResult<Payment> {
        match item.method {
            PaymentMethod::Card | PaymentMethod::Contactless => {
                let mut payment = self.gateway.charge(item.amount, CURRENCY_CODE).await?;
                payment.method = item.method;
                Ok(payment)
            }
            PaymentMethod::Cash => Ok(Payment::local(PaymentMethod::Cash, item.amount)),
            PaymentMethod::Voucher => Ok(match &item.reference {
                Some(code) => {
                    Payment::approved(PaymentMethod::Voucher, item.amount, Some(code.clone()))
                }
                None => Payment::local(PaymentMethod::Voucher, item.amount),
            }),
            PaymentMethod::BankTransfer => Err(PaymentError::UnsupportedMethod(item.method)),
        }
    }

    /// Unwinds `settled` in creation order and returns the error to report
    /// for the failed leg `step`.
    async fn compensate(
        &self,
        sale: &Sale,
        step: usize,
        cause: PaymentError,
        settled: Vec<Payment>,
    ) -> PaymentError {
        let mut reversed: Vec<Compensation> = Vec::with_capacity(settled.len());
        let mut pending = settled.into_iter();

        while let Some(mut payment) = pending.next() {
            if !payment.method.is_gateway_backed() {
                info!(
                    sale_id = %sale.id,
                    payment_id = %payment.id,
                    method = %payment.method,
                    amount = %payment.amount,
                    "Recorded reversal of local payment"
                );
                payment.mark_refunded();
                reversed.push(Compensation {
                    payment,
                    action: CompensationAction::Recorded,
                });
                continue;
            }

            let refund = match payment.reference.as_deref() {
                Some(reference) => self
                    .gateway
                    .refund(payment.amount, reference, CURRENCY_CODE)
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|r| {
                        if r.success {
                            Ok(r.reference)
                        } else {
                            Err(r
                                .error_message
                                .unwrap_or_else(|| "refund not accepted".to_string()))
                        }
                    }),
                None => Err("payment has no provider reference to refund against".to_string()),
            };

            match refund {
                Ok(refund_reference) => {
                    info!(
                        sale_id = %sale.id,
                        payment_id = %payment.id,
                        amount = %payment.amount,
                        refund_reference = %refund_reference,
                        "Refunded split leg"
                    );
                    payment.mark_refunded();
                    reversed.push(Compensation {
                        payment,
                        action: CompensationAction::Refunded { refund_reference },
                    });
                }
                Err(reason) => {
                    let mut unreversed = vec![payment.clone()];
                    unreversed.extend(pending.by_ref());

                    let failure = ReversalFailure {
                        sale_id: sale.id.clone(),
                        payment,
                        reason,
                        cause,
                        reversed,
                        unreversed,
                    };
                    error!(
                        target: RECONCILIATION_TARGET,
                        sale_id = %failure.sale_id,
                        payment_id = %failure.payment.id,
                        reference = ?failure.payment.reference,
                        amount = %failure.payment.amount,
                        outstanding = %failure.outstanding(),
                        reason = %failure.reason,
                        "Split payment reversal failed, manual reconciliation required"
                    );
                    return PaymentError::ReversalFailed(Box::new(failure));
                }
            }
        }

        PaymentError::SettlementFailed {
            step,
            cause: Box::new(cause),
            compensations: reversed,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
