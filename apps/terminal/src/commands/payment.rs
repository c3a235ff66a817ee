//! # Payment Commands
//!
//! `pay` settles the whole sale with one method; `split` settles it across
//! several. Both hand over to [`PosSession`], which owns the settling flag
//! and receipt printing.

use epos_core::{Money, Payment, PaymentMethod, SplitPaymentItem};
use tracing::debug;

use super::{parse_amount, parse_method};
use crate::error::ApiError;
use crate::state::{PosSession, SettledSale};

/// Pays with one method. Without an amount the customer pays the exact
/// total.
pub async fn pay(
    session: &PosSession,
    method: PaymentMethod,
    amount: Option<Money>,
) -> Result<String, ApiError> {
    debug!(%method, amount = ?amount, "pay command");

    let settled = session.pay(method, amount).await?;
    Ok(format_settled(&settled))
}

/// Pays across several methods.
pub async fn split(session: &PosSession, legs: &[SplitPaymentItem]) -> Result<String, ApiError> {
    debug!(legs = legs.len(), "split command");

    let settled = session.split(legs).await?;
    Ok(format_settled(&settled))
}

/// Parses `method:amount[:reference]`, e.g. `card:12.50` or
/// `voucher:5:GIFT-0042`.
pub fn parse_split_leg(token: &str) -> Result<SplitPaymentItem, ApiError> {
    let mut parts = token.splitn(3, ':');
    let (Some(method), Some(amount)) = (parts.next(), parts.next()) else {
        return Err(ApiError::validation(format!(
            "Invalid payment '{}'. Expected method:amount, e.g. card:12.50",
            token
        )));
    };

    let item = SplitPaymentItem::new(parse_method(method)?, parse_amount(amount)?);
    match parts.next() {
        None => Ok(item),
        Some(reference) if !reference.trim().is_empty() => {
            Ok(item.with_reference(reference.trim()))
        }
        Some(_) => Err(ApiError::validation(format!(
            "Empty reference in '{}'",
            token
        ))),
    }
}

fn format_payment(payment: &Payment) -> String {
    let mut line = format!("  {:<14} {:>10}", payment.method.label(), payment.amount.to_string());
    if let Some(reference) = &payment.reference {
        line.push_str(&format!("  ref {}", reference));
    }
    if let Some(tendered) = payment.tendered {
        line.push_str(&format!("  tendered {}", tendered));
    }
    line
}

/// Summarises a completed sale for the operator.
pub fn format_settled(settled: &SettledSale) -> String {
    let sale = &settled.sale;
    let mut out = format!("Paid {}\n", sale.total);
    for payment in &sale.payments {
        out.push_str(&format_payment(payment));
        out.push('\n');
    }

    let change = settled.change();
    if change.is_positive() {
        out.push_str(&format!("Change due: {}\n", change));
    }

    if settled.printed {
        out.push_str(&format!("Receipt {} printed", settled.receipt_number));
    } else {
        out.push_str(&format!(
            "Receipt {} NOT printed, reprint from the spool",
            settled.receipt_number
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::sale::add_item;
    use crate::error::ErrorCode;
    use crate::printer::LogPrinter;
    use epos_core::receipt::StoreDetails;
    use epos_payments::gateway::fake::FakeGateway;
    use std::sync::Arc;

    fn session_with(gateway: FakeGateway) -> PosSession {
        let session = PosSession::new(
            Arc::new(gateway),
            Arc::new(LogPrinter),
            StoreDetails::default(),
            42,
        );
        // £9.99 + 20% = £11.99
        add_item(&session, "P-1", Money::from_pence(999), None, None).unwrap();
        session
    }

    #[test]
    fn test_parse_split_leg() {
        let leg = parse_split_leg("card:12.50").unwrap();
        assert_eq!(leg.method, PaymentMethod::Card);
        assert_eq!(leg.amount, Money::from_pence(1250));
        assert_eq!(leg.reference, None);

        let leg = parse_split_leg("voucher:5:GIFT-0042").unwrap();
        assert_eq!(leg.reference.as_deref(), Some("GIFT-0042"));

        for token in ["card", "card:", "cheque:10", "voucher:5:", "cash:-1"] {
            let err = parse_split_leg(token).unwrap_err();
            assert_eq!(err.code, ErrorCode::ValidationError, "{token}");
        }
    }

    #[tokio::test]
    async fn test_pay_exact_total_by_default() {
        let session = session_with(FakeGateway::new());

        let reply = pay(&session, PaymentMethod::Card, None).await.unwrap();
        assert!(reply.starts_with("Paid £11.99"));
        assert!(reply.contains("ref fake-ch-1"));
        assert!(reply.contains("printed"));
        assert!(!reply.contains("Change due"));
    }

    #[tokio::test]
    async fn test_cash_change_shown() {
        let session = session_with(FakeGateway::new());

        let reply = pay(&session, PaymentMethod::Cash, Some(Money::from_pence(2000)))
            .await
            .unwrap();
        assert!(reply.contains("Change due: £8.01"));
        assert!(reply.contains("tendered £20.00"));
    }

    #[tokio::test]
    async fn test_declined_card() {
        let session =
            session_with(FakeGateway::new().fail_charge_at(1, FakeGateway::decline("Do not honour")));

        let err = pay(&session, PaymentMethod::Card, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentDeclined);
        assert!(session.snapshot().payments.is_empty());
        assert_eq!(session.snapshot().item_count(), 1);
    }

    #[tokio::test]
    async fn test_split_mismatch() {
        let session = session_with(FakeGateway::new());
        let legs = [
            parse_split_leg("cash:5").unwrap(),
            parse_split_leg("card:5").unwrap(),
        ];

        let err = split(&session, &legs).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AmountMismatch);
    }

    #[tokio::test]
    async fn test_split_settles() {
        let session = session_with(FakeGateway::new());
        let legs = [
            parse_split_leg("cash:6").unwrap(),
            parse_split_leg("contactless:5.99").unwrap(),
        ];

        let reply = split(&session, &legs).await.unwrap();
        assert!(reply.contains("Cash"));
        assert!(reply.contains("Contactless"));
        assert!(session.snapshot().is_empty());
    }
}
