//! Single-method settlement.
//!
//! ```text
//! amount_paid < total ──► InsufficientPayment
//! cash                ──► approved locally, change = amount_paid − total
//! card / contactless  ──► gateway.charge(total)
//! bank transfer       ──► approved locally with a generated reference
//! voucher             ──► approved locally with a generated reference
//! ```
//!
//! Nothing is unwound here: a failed single charge leaves the sale pending
//! for another attempt.

use std::sync::Arc;

use epos_core::validation::validate_payment_amount;
use epos_core::{Money, Payment, PaymentMethod, Sale, CURRENCY_CODE};
use tracing::{debug, info, warn};

use crate::error::{PaymentError, PaymentResult};
use crate::gateway::PaymentGateway;

/// Settles a sale with one payment method.
#[derive(Clone)]
pub struct SinglePaymentProcessor {
    gateway: Arc<dyn PaymentGateway>,
}

impl SinglePaymentProcessor {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        SinglePaymentProcessor { gateway }
    }

    /// Settles `sale.total` with `method`.
    ///
    /// `amount_paid` is what the operator entered. Only cash may exceed the
    /// total; the excess is recorded as change. Every other method settles
    /// exactly the total.
    pub async fn settle(
        &self,
        sale: &Sale,
        method: PaymentMethod,
        amount_paid: Money,
    ) -> PaymentResult<Payment> {
        sale.ensure_payable()?;
        validate_payment_amount(amount_paid)?;

        if amount_paid < sale.total {
            return Err(PaymentError::InsufficientPayment {
                due: sale.total,
                provided: amount_paid,
            });
        }

        debug!(
            sale_id = %sale.id,
            method = %method,
            total = %sale.total,
            amount_paid = %amount_paid,
            "Settling sale"
        );

        let payment = match method {
            PaymentMethod::Cash => {
                let change = amount_paid - sale.total;
                Payment::local(PaymentMethod::Cash, sale.total).with_tender(amount_paid, change)
            }
            PaymentMethod::Card | PaymentMethod::Contactless => {
                let mut payment = self
                    .gateway
                    .charge(sale.total, CURRENCY_CODE)
                    .await
                    .inspect_err(|e| {
                        warn!(sale_id = %sale.id, method = %method, error = %e, "Charge failed")
                    })?;
                payment.method = method;
                payment
            }
            PaymentMethod::BankTransfer | PaymentMethod::Voucher => {
                Payment::local(method, sale.total)
            }
        };

        info!(
            sale_id = %sale.id,
            payment_id = %payment.id,
            method = %payment.method,
            amount = %payment.amount,
            change = ?payment.change,
            "Sale settled"
        );
        Ok(payment)
    }
}
