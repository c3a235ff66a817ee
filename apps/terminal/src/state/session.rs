//! # POS Session
//!
//! Owns the one active sale on this till and serializes everything that
//! touches it.
//!
//! ## Thread Safety
//! The sale is wrapped in `Arc<Mutex<T>>` because:
//! 1. Item edits and settlement may be requested concurrently
//! 2. Only one of them may change the sale at a time
//! 3. The lock is never held across a gateway call
//!
//! ## Settlement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Session Operations                                   │
//! │                                                                         │
//! │  add / remove ───────► rejected while settling, else edit the sale     │
//! │                                                                         │
//! │  pay / split                                                            │
//! │    1. lock: settling = true, snapshot the sale                          │
//! │    2. settle the snapshot (lock released, gateway calls happen here)    │
//! │    3. ok ──► complete ──► print receipt (best-effort) ──► reset        │
//! │       reversal failed ──► cancel ──► reset (reconciliation logged)     │
//! │       other failure ────► sale stays pending for another attempt       │
//! │    4. settling = false                                                  │
//! │                                                                         │
//! │  cancel ─────────────► rejected while settling, else cancel + reset    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use epos_core::receipt::{render_receipt, StoreDetails};
use epos_core::{CoreResult, Money, Payment, PaymentMethod, Sale, SplitPaymentItem};
use epos_payments::{
    PaymentError, PaymentGateway, PaymentResult, SinglePaymentProcessor, SplitPaymentCoordinator,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::printer::{PrinterError, ReceiptPrinter};

/// A sale that was paid for and printed.
#[derive(Debug, Clone)]
pub struct SettledSale {
    /// The completed sale, as it was before the session reset.
    pub sale: Sale,
    pub receipt_number: String,
    /// The rendered receipt.
    pub receipt: String,
    /// False if the printer sink failed.
    pub printed: bool,
}

impl SettledSale {
    /// Cash change owed to the customer.
    pub fn change(&self) -> Money {
        self.sale.change_given()
    }
}

/// Clears the settling flag when a settlement ends, however it ends.
struct SettlementGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SettlementGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The active POS session.
pub struct PosSession {
    sale: Arc<Mutex<Sale>>,
    settling: AtomicBool,
    single: SinglePaymentProcessor,
    split: SplitPaymentCoordinator,
    printer: Arc<dyn ReceiptPrinter>,
    store: StoreDetails,
    paper_width: usize,
}

impl PosSession {
    /// Creates a session with an empty sale.
    ///
    /// The gateway is shared by single and split settlement.
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        printer: Arc<dyn ReceiptPrinter>,
        store: StoreDetails,
        paper_width: usize,
    ) -> Self {
        PosSession {
            sale: Arc::new(Mutex::new(Sale::new())),
            settling: AtomicBool::new(false),
            single: SinglePaymentProcessor::new(gateway.clone()),
            split: SplitPaymentCoordinator::new(gateway),
            printer,
            store,
            paper_width,
        }
    }

    /// Executes a function with read access to the sale.
    pub fn with_sale<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Sale) -> R,
    {
        let sale = self.sale.lock().expect("Sale mutex poisoned");
        f(&sale)
    }

    fn with_sale_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Sale) -> R,
    {
        let mut sale = self.sale.lock().expect("Sale mutex poisoned");
        f(&mut sale)
    }

    /// A copy of the current sale.
    pub fn snapshot(&self) -> Sale {
        self.with_sale(Sale::clone)
    }

    pub fn is_settling(&self) -> bool {
        self.settling.load(Ordering::SeqCst)
    }

    /// Applies an item edit, unless a payment is being taken.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// session.edit(|sale| sale.add_item(item))?;
    /// ```
    pub fn edit<F, R>(&self, f: F) -> Result<R, ApiError>
    where
        F: FnOnce(&mut Sale) -> CoreResult<R>,
    {
        self.with_sale_mut(|sale| {
            if self.is_settling() {
                return Err(ApiError::settlement_in_progress());
            }
            f(sale).map_err(ApiError::from)
        })
    }

    /// Abandons the current sale and starts a fresh one.
    ///
    /// Returns the id of the cancelled sale.
    pub fn cancel(&self) -> Result<String, ApiError> {
        self.with_sale_mut(|sale| {
            if self.is_settling() {
                return Err(ApiError::settlement_in_progress());
            }
            sale.cancel()?;
            let cancelled = sale.id.clone();
            info!(sale_id = %cancelled, items = sale.item_count(), "Sale cancelled");
            sale.reset();
            Ok(cancelled)
        })
    }

    /// Settles the sale with one method.
    ///
    /// Without `amount_paid` the customer pays the exact total of the sale
    /// as it stands when settlement begins.
    pub async fn pay(
        &self,
        method: PaymentMethod,
        amount_paid: Option<Money>,
    ) -> Result<SettledSale, ApiError> {
        let (sale, guard) = self.begin_settlement()?;
        let amount_paid = amount_paid.unwrap_or(sale.total);
        let result = self
            .single
            .settle(&sale, method, amount_paid)
            .await
            .map(|payment| vec![payment]);
        let completed = self.finish(&sale, result)?;
        drop(guard);
        Ok(self.print(completed).await)
    }

    /// Settles the sale across several methods.
    pub async fn split(&self, legs: &[SplitPaymentItem]) -> Result<SettledSale, ApiError> {
        let (sale, guard) = self.begin_settlement()?;
        let result = self.split.settle(&sale, legs).await;
        let completed = self.finish(&sale, result)?;
        drop(guard);
        Ok(self.print(completed).await)
    }

    /// Marks the session as settling and snapshots the sale, atomically
    /// with respect to edits.
    fn begin_settlement(&self) -> Result<(Sale, SettlementGuard<'_>), ApiError> {
        self.with_sale_mut(|sale| {
            if self
                .settling
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Err(ApiError::settlement_in_progress());
            }
            debug!(sale_id = %sale.id, total = %sale.total, "Settlement started");
            Ok((
                sale.clone(),
                SettlementGuard {
                    flag: &self.settling,
                },
            ))
        })
    }

    /// Applies a settlement result to the live sale and returns the completed
    /// sale, already cleared from the session.
    fn finish(&self, snapshot: &Sale, result: PaymentResult<Vec<Payment>>) -> Result<Sale, ApiError> {
        match result {
            Ok(payments) => {
                let completed = self.with_sale_mut(|sale| {
                    sale.complete(payments)?;
                    let completed = sale.clone();
                    sale.reset();
                    Ok::<_, ApiError>(completed)
                })?;
                info!(
                    sale_id = %completed.id,
                    total = %completed.total,
                    payments = completed.payments.len(),
                    "Sale completed"
                );
                Ok(completed)
            }
            Err(err @ PaymentError::ReversalFailed(_)) => {
                self.with_sale_mut(|sale| {
                    if sale.cancel().is_ok() {
                        sale.reset();
                    }
                });
                warn!(
                    sale_id = %snapshot.id,
                    "Sale cancelled after failed reversal; see reconciliation log"
                );
                Err(err.into())
            }
            Err(err) => {
                warn!(sale_id = %snapshot.id, error = %err, "Settlement failed, sale still open");
                Err(err.into())
            }
        }
    }

    /// Renders and prints the receipt. A printer failure is logged and
    /// reported on the result, never raised.
    ///
    /// Sinks may block (the spool sink writes files), so the print runs on
    /// the blocking pool.
    async fn print(&self, sale: Sale) -> SettledSale {
        let now = Local::now();
        let receipt_number = receipt_number(now);
        let receipt = render_receipt(
            &sale,
            &self.store,
            &receipt_number,
            now.naive_local(),
            self.paper_width,
        );

        let printer = Arc::clone(&self.printer);
        let (number, document) = (receipt_number.clone(), receipt.clone());
        let outcome = tokio::task::spawn_blocking(move || printer.print(&number, &document))
            .await
            .unwrap_or_else(|e| Err(PrinterError::Task(e.to_string())));

        let printed = match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    sale_id = %sale.id,
                    receipt_number = %receipt_number,
                    error = %e,
                    "Receipt printing failed; payment stands"
                );
                false
            }
        };

        SettledSale {
            sale,
            receipt_number,
            receipt,
            printed,
        }
    }
}

/// `yymmdd-HHMMSS-XXXX`, where the suffix is random.
fn receipt_number(at: DateTime<Local>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}",
        at.format("%y%m%d-%H%M%S"),
        suffix[..4].to_ascii_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use epos_core::{SaleItem, SaleStatus};
    use epos_payments::gateway::fake::FakeGateway;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingPrinter {
        printed: Mutex<Vec<String>>,
    }

    impl ReceiptPrinter for RecordingPrinter {
        fn print(&self, receipt_number: &str, _document: &str) -> Result<(), PrinterError> {
            self.printed.lock().unwrap().push(receipt_number.to_string());
            Ok(())
        }
    }

    struct BrokenPrinter;

    impl ReceiptPrinter for BrokenPrinter {
        fn print(&self, _receipt_number: &str, _document: &str) -> Result<(), PrinterError> {
            Err(PrinterError::Spool {
                path: "/dev/full/receipt.txt".into(),
                source: std::io::Error::other("disk full"),
            })
        }
    }

    fn session_with(gateway: FakeGateway, printer: Arc<dyn ReceiptPrinter>) -> PosSession {
        let store = StoreDetails {
            name: "Corner Shop Ltd".into(),
            ..StoreDetails::default()
        };
        PosSession::new(Arc::new(gateway), printer, store, 42)
    }

    fn add(session: &PosSession, pence: i64) {
        session
            .edit(|sale| sale.add_item(SaleItem::new("P-1", Money::from_pence(pence), "standard")?))
            .unwrap();
    }

    #[tokio::test]
    async fn test_cash_sale_completes_prints_and_resets() {
        let printer = Arc::new(RecordingPrinter::default());
        let session = session_with(FakeGateway::new(), printer.clone());
        add(&session, 999);
        let sale_id = session.snapshot().id;

        let settled = session
            .pay(PaymentMethod::Cash, Some(Money::from_pence(1200)))
            .await
            .unwrap();

        assert_eq!(settled.sale.id, sale_id);
        assert_eq!(settled.sale.status, SaleStatus::Completed);
        assert_eq!(settled.change(), Money::from_pence(1));
        assert!(settled.printed);
        assert!(settled.receipt.contains("Corner Shop Ltd"));
        assert_eq!(*printer.printed.lock().unwrap(), vec![settled.receipt_number.clone()]);

        let next = session.snapshot();
        assert!(next.is_empty());
        assert_ne!(next.id, sale_id);
        assert!(!session.is_settling());
    }

    #[tokio::test]
    async fn test_printer_failure_does_not_undo_payment() {
        let session = session_with(FakeGateway::new(), Arc::new(BrokenPrinter));
        add(&session, 1000);

        let settled = session
            .pay(PaymentMethod::Card, Some(Money::from_pence(1200)))
            .await
            .unwrap();

        assert!(!settled.printed);
        assert_eq!(settled.sale.status, SaleStatus::Completed);
        assert!(session.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_and_cancel_rejected_while_settling() {
        let gateway = FakeGateway::new().with_charge_delay(Duration::from_secs(5));
        let session = session_with(gateway, Arc::new(RecordingPrinter::default()));
        add(&session, 1000);

        let (paid, (edit, cancel)) = tokio::join!(
            session.pay(PaymentMethod::Card, Some(Money::from_pence(1200))),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                assert!(session.is_settling());
                let edit = session.edit(|sale| {
                    sale.add_item(SaleItem::new("P-2", Money::from_pence(100), "standard")?)
                });
                (edit, session.cancel())
            }
        );

        assert_eq!(edit.unwrap_err().code, ErrorCode::SettlementInProgress);
        assert_eq!(cancel.unwrap_err().code, ErrorCode::SettlementInProgress);

        let settled = paid.unwrap();
        assert_eq!(settled.sale.items.len(), 1);
        assert!(!session.is_settling());
    }

    #[tokio::test]
    async fn test_failed_split_leaves_sale_open() {
        let gateway = FakeGateway::new().fail_charge_at(2, FakeGateway::decline("card blocked"));
        let session = session_with(gateway, Arc::new(RecordingPrinter::default()));
        add(&session, 5000); // total £60.00

        let legs = [
            SplitPaymentItem::new(PaymentMethod::Card, Money::from_pence(3000)),
            SplitPaymentItem::new(PaymentMethod::Card, Money::from_pence(3000)),
        ];
        let err = session.split(&legs).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentDeclined);

        let sale = session.snapshot();
        assert_eq!(sale.status, SaleStatus::Pending);
        assert_eq!(sale.items.len(), 1);
        assert!(!session.is_settling());

        // Charge 3 is not scripted to fail, so a retry with one card works
        let legs = [
            SplitPaymentItem::new(PaymentMethod::Cash, Money::from_pence(1000)),
            SplitPaymentItem::new(PaymentMethod::Card, Money::from_pence(5000)),
        ];
        let settled = session.split(&legs).await.unwrap();
        assert_eq!(settled.sale.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_reversal_failure_cancels_sale() {
        let gateway = FakeGateway::new()
            .fail_charge_at(2, FakeGateway::decline("card blocked"))
            .fail_refunds("provider down");
        let session = session_with(gateway, Arc::new(RecordingPrinter::default()));
        add(&session, 5000);
        let sale_id = session.snapshot().id;

        let legs = [
            SplitPaymentItem::new(PaymentMethod::Card, Money::from_pence(3000)),
            SplitPaymentItem::new(PaymentMethod::Card, Money::from_pence(3000)),
        ];
        let err = session.split(&legs).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ReversalFailed);
        assert!(err.message.contains(&sale_id));
        assert!(session.snapshot().is_empty());
        assert_ne!(session.snapshot().id, sale_id);
    }

    #[tokio::test]
    async fn test_default_amount_is_snapshot_total() {
        let session = session_with(FakeGateway::new(), Arc::new(RecordingPrinter::default()));
        add(&session, 999);

        let settled = session.pay(PaymentMethod::Cash, None).await.unwrap();

        let payment = &settled.sale.payments[0];
        assert_eq!(payment.amount, Money::from_pence(1199));
        assert_eq!(payment.tendered, Some(Money::from_pence(1199)));
        assert_eq!(settled.change(), Money::zero());
    }

    #[tokio::test]
    async fn test_default_amount_on_empty_sale_is_rejected() {
        let session = session_with(FakeGateway::new(), Arc::new(RecordingPrinter::default()));

        let err = session.pay(PaymentMethod::Card, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SaleError);
        assert!(!session.is_settling());
    }

    /// Records which thread each receipt was printed on.
    #[derive(Default)]
    struct ThreadRecordingPrinter {
        threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl ReceiptPrinter for ThreadRecordingPrinter {
        fn print(&self, _receipt_number: &str, _document: &str) -> Result<(), PrinterError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_printing_runs_off_the_async_thread() {
        let printer = Arc::new(ThreadRecordingPrinter::default());
        let session = session_with(FakeGateway::new(), printer.clone());
        add(&session, 999);

        let settled = session.pay(PaymentMethod::Card, None).await.unwrap();

        assert!(settled.printed);
        let threads = printer.threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[test]
    fn test_cancel_discards_sale() {
        let session = session_with(FakeGateway::new(), Arc::new(RecordingPrinter::default()));
        add(&session, 500);
        let sale_id = session.snapshot().id;

        assert_eq!(session.cancel().unwrap(), sale_id);
        assert!(session.snapshot().is_empty());
    }

    #[test]
    fn test_receipt_number_format() {
        let at = Local::now();
        let number = receipt_number(at);
        assert_eq!(number.len(), "yymmdd-HHMMSS-XXXX".len());
        assert!(number.starts_with(&at.format("%y%m%d-").to_string()));
    }
}
