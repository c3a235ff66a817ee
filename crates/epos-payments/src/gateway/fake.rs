//! Scripted in-memory gateway for tests.
//!
//! Approves everything unless told otherwise and records every call, so a
//! test can assert exactly which charges and refunds were attempted.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use epos_core::{Money, Payment, PaymentMethod};

use super::{ensure_gbp, PaymentGateway, RefundResult};
use crate::error::{GatewayError, PaymentResult};

/// A call the fake received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Charge { amount: Money },
    Refund { amount: Money, reference: String },
}

#[derive(Debug, Clone)]
enum ChargeScript {
    Fail(GatewayError),
    NoReference,
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<GatewayCall>,
    charges: usize,
    refunds: usize,
}

/// In-memory [`PaymentGateway`].
#[derive(Debug, Default)]
pub struct FakeGateway {
    /// Scripted outcomes keyed by 1-based charge number.
    charge_scripts: HashMap<usize, ChargeScript>,
    refund_failure: Option<String>,
    charge_delay: Option<Duration>,
    state: Mutex<FakeState>,
}

impl FakeGateway {
    pub fn new() -> Self {
        FakeGateway::default()
    }

    /// The `n`th charge (1-based) fails with `error`.
    pub fn fail_charge_at(mut self, n: usize, error: GatewayError) -> Self {
        self.charge_scripts.insert(n, ChargeScript::Fail(error));
        self
    }

    /// The `n`th charge (1-based) is approved but carries no reference.
    pub fn missing_reference_at(mut self, n: usize) -> Self {
        self.charge_scripts.insert(n, ChargeScript::NoReference);
        self
    }

    /// Every refund is answered with `success: false`.
    pub fn fail_refunds(mut self, message: impl Into<String>) -> Self {
        self.refund_failure = Some(message.into());
        self
    }

    /// Every charge waits this long before answering.
    pub fn with_charge_delay(mut self, delay: Duration) -> Self {
        self.charge_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn charge_count(&self) -> usize {
        self.state().charges
    }

    pub fn refund_count(&self) -> usize {
        self.state().refunds
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A decline from the fake provider, for scripting.
    pub fn decline(message: &str) -> GatewayError {
        GatewayError::Declined {
            provider: "fake".to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn name(&self) -> &str {
        "fake"
    }

    async fn charge(&self, amount: Money, currency: &str) -> PaymentResult<Payment> {
        ensure_gbp(currency)?;

        let n = {
            let mut state = self.state();
            state.calls.push(GatewayCall::Charge { amount });
            state.charges += 1;
            state.charges
        };

        if let Some(delay) = self.charge_delay {
            tokio::time::sleep(delay).await;
        }

        match self.charge_scripts.get(&n) {
            Some(ChargeScript::Fail(error)) => Err(error.clone().into()),
            Some(ChargeScript::NoReference) => {
                Ok(Payment::approved(PaymentMethod::Card, amount, None))
            }
            None => Ok(Payment::approved(
                PaymentMethod::Card,
                amount,
                Some(format!("fake-ch-{}", n)),
            )),
        }
    }

    async fn refund(
        &self,
        amount: Money,
        reference: &str,
        currency: &str,
    ) -> PaymentResult<RefundResult> {
        ensure_gbp(currency)?;

        let n = {
            let mut state = self.state();
            state.calls.push(GatewayCall::Refund {
                amount,
                reference: reference.to_string(),
            });
            state.refunds += 1;
            state.refunds
        };

        match &self.refund_failure {
            Some(message) => Ok(RefundResult::failed(message.clone())),
            None => Ok(RefundResult::succeeded(format!("fake-rf-{}", n))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_outcomes() {
        let gateway = FakeGateway::new()
            .fail_charge_at(2, FakeGateway::decline("card blocked"))
            .missing_reference_at(3);

        let first = gateway.charge(Money::from_pence(100), "GBP").await.unwrap();
        assert_eq!(first.reference.as_deref(), Some("fake-ch-1"));

        assert!(gateway.charge(Money::from_pence(100), "GBP").await.is_err());

        let third = gateway.charge(Money::from_pence(100), "GBP").await.unwrap();
        assert!(third.reference.is_none());

        assert_eq!(gateway.charge_count(), 3);
        assert_eq!(gateway.refund_count(), 0);
    }

    #[tokio::test]
    async fn test_refunds_recorded() {
        let gateway = FakeGateway::new().fail_refunds("provider down");

        let result = gateway
            .refund(Money::from_pence(500), "fake-ch-1", "GBP")
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::Refund {
                amount: Money::from_pence(500),
                reference: "fake-ch-1".into(),
            }]
        );
    }
}
