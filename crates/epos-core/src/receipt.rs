//! # Receipt Layout
//!
//! Renders a completed sale as plain text for a receipt printer. Layout
//! only; where the text goes is the terminal's printer sink.
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            Sterling Coffee Co            │  header: store details
//! │ VAT: GB123456789                         │
//! │ Date: 19/10/2026                         │  UK date and time
//! │ Receipt #: 20261019-140322-1A2B          │
//! │------------------------------------------│
//! │ Flat White                               │  one block per item
//! │ 1 x £3.20                          £3.20 │
//! │------------------------------------------│
//! │ Subtotal                           £3.20 │
//! │ VAT (20%)                          £0.64 │  per-rate breakdown
//! │ Total                              £3.84 │
//! │------------------------------------------│
//! │ Cash                               £3.84 │  every payment
//! │ Tendered / Change                        │
//! │------------------------------------------│
//! │       Thank you for your business!       │  footer
//! └──────────────────────────────────────────┘
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::sale::Sale;

/// Narrowest paper the layout will render for.
pub const MIN_RECEIPT_WIDTH: usize = 24;

/// Company details printed in the receipt header and footer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDetails {
    pub name: String,
    pub address: String,
    pub city: String,
    pub postcode: String,
    pub phone: String,
    pub vat_number: String,
    pub company_number: String,
}

/// Renders `sale` as a receipt `width` characters wide.
///
/// The caller supplies the receipt number and print time so the output is
/// fully determined by the arguments.
pub fn render_receipt(
    sale: &Sale,
    store: &StoreDetails,
    receipt_number: &str,
    printed_at: NaiveDateTime,
    width: usize,
) -> String {
    let mut r = ReceiptWriter::new(width);

    // Header
    r.centered(&store.name);
    r.optional(&store.address);
    r.optional(&store.city);
    r.optional(&store.postcode);
    if !store.phone.is_empty() {
        r.line(&format!("Tel: {}", store.phone));
    }
    if !store.vat_number.is_empty() {
        r.line(&format!("VAT: {}", store.vat_number));
    }
    r.blank();
    r.line(&format!("Date: {}", printed_at.format("%d/%m/%Y")));
    r.line(&format!("Time: {}", printed_at.format("%H:%M:%S")));
    r.blank();
    r.line(&format!("Receipt #: {}", receipt_number));
    r.rule();

    // Items
    for item in &sale.items {
        r.line(&item.name);
        r.columns(
            &format!("{} x {}", item.quantity, item.unit_price),
            &item.line_total.to_string(),
        );
    }
    r.rule();

    // Totals
    r.columns("Subtotal", &sale.subtotal.to_string());
    let breakdown = sale.vat_breakdown();
    if breakdown.is_empty() {
        r.columns("VAT", &sale.vat_amount.to_string());
    }
    for (rate, amount) in breakdown {
        r.columns(&format!("VAT ({})", rate), &amount.to_string());
    }
    r.columns("Total", &sale.total.to_string());
    r.rule();

    // Payments
    for payment in &sale.payments {
        r.columns(payment.method.label(), &payment.amount.to_string());
        if let Some(reference) = &payment.reference {
            r.line(&format!("  Ref: {}", reference));
        }
        if let (Some(tendered), Some(change)) = (payment.tendered, payment.change) {
            r.columns("  Tendered", &tendered.to_string());
            r.columns("  Change", &change.to_string());
        }
    }
    r.rule();

    // Footer
    r.blank();
    r.centered("Thank you for your business!");
    r.blank();
    if !store.vat_number.is_empty() {
        r.line(&format!("VAT Reg: {}", store.vat_number));
    }
    if !store.company_number.is_empty() {
        r.line(&format!("Company No: {}", store.company_number));
    }

    r.finish()
}

/// Line buffer that keeps every line within the paper width.
struct ReceiptWriter {
    width: usize,
    out: String,
}

impl ReceiptWriter {
    fn new(width: usize) -> Self {
        ReceiptWriter {
            width: width.max(MIN_RECEIPT_WIDTH),
            out: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        let clipped: String = text.chars().take(self.width).collect();
        self.out.push_str(clipped.trim_end());
        self.out.push('\n');
    }

    fn optional(&mut self, text: &str) {
        if !text.is_empty() {
            self.line(text);
        }
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn rule(&mut self) {
        let rule = "-".repeat(self.width);
        self.line(&rule);
    }

    fn centered(&mut self, text: &str) {
        let len = text.chars().count();
        let pad = self.width.saturating_sub(len) / 2;
        self.line(&format!("{}{}", " ".repeat(pad), text));
    }

    /// Left text, right text flush to the edge. The right column always
    /// survives; the left one is clipped to make room.
    fn columns(&mut self, left: &str, right: &str) {
        let right_len = right.chars().count();
        let room = self.width.saturating_sub(right_len + 1);
        let left: String = left.chars().take(room).collect();
        let gap = self.width - right_len.min(self.width) - left.chars().count();
        self.line(&format!("{}{}{}", left, " ".repeat(gap), right));
    }

    fn finish(self) -> String {
        self.out
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
