//! # Sale Aggregate
//!
//! The in-memory sale rung up at the till: its line items, derived totals,
//! status and, once settled, its payments.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Sale::new() ──► Pending ──┬── add_item / remove_item (recompute)     │
//! │                     │       │                                           │
//! │                     │       └── reset() ──► Pending (empty)            │
//! │                     │                                                   │
//! │                     ├── complete(payments) ──► Completed               │
//! │                     │                                                   │
//! │                     └── cancel() ──────────► Cancelled                 │
//! │                                                                         │
//! │   Completed / Cancelled ── reset() ──► Pending (empty, fresh id)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - `subtotal == Σ items.line_total`
//! - `vat_amount == Σ items.vat_amount`
//! - `total == subtotal + vat_amount`
//!
//! Totals are always recomputed over the whole item list, never adjusted
//! incrementally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Payment, Product, SaleStatus, TaxRate};
use crate::validation::{validate_price, validate_product_id, validate_product_name, validate_sale_size};
use crate::vat::resolve_rate;
use crate::MAX_SALE_ITEMS;

// =============================================================================
// Sale Item
// =============================================================================

/// A line on the sale. Immutable once added; removed by id.
///
/// ## Quantity
/// Lines are built one tap at a time from the POS grid, so `quantity` is
/// always 1 and `line_total` is the unit price. Ringing the same product
/// twice adds two lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen). Falls back to the product id.
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub vat_rate: TaxRate,
    /// Per-unit VAT, rounded to the penny.
    pub vat_amount: Money,
    /// Pre-VAT extended price.
    pub line_total: Money,
}

impl SaleItem {
    /// Builds a line for `product_id` at `unit_price`, resolving the VAT
    /// rate from the table (unknown ids fall back to the standard rate).
    pub fn new(product_id: &str, unit_price: Money, vat_rate_id: &str) -> CoreResult<Self> {
        validate_product_id(product_id)?;
        validate_price(unit_price)?;

        let rate = resolve_rate(vat_rate_id).rate;
        let product_id = product_id.trim().to_string();

        Ok(SaleItem {
            id: Uuid::new_v4().to_string(),
            name: product_id.clone(),
            product_id,
            quantity: 1,
            unit_price,
            vat_rate: rate,
            vat_amount: unit_price.calculate_vat(rate),
            line_total: unit_price,
        })
    }

    /// Builds a line from a product tile, snapshotting name and price.
    pub fn from_product(product: &Product) -> CoreResult<Self> {
        validate_product_name(&product.name)?;
        let mut item = SaleItem::new(&product.id, product.price, &product.vat_rate_id)?;
        item.name = product.name.trim().to_string();
        Ok(item)
    }

    /// Line total including VAT.
    #[inline]
    pub fn gross_total(&self) -> Money {
        self.line_total + self.vat_amount
    }
}

// =============================================================================
// Sale
// =============================================================================

/// The sale owned by the active POS session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub items: Vec<SaleItem>,
    pub subtotal: Money,
    pub vat_amount: Money,
    pub total: Money,
    pub status: SaleStatus,
    pub payments: Vec<Payment>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for Sale {
    fn default() -> Self {
        Self::new()
    }
}

impl Sale {
    /// Creates an empty pending sale.
    pub fn new() -> Self {
        let now = Utc::now();
        Sale {
            id: Uuid::new_v4().to_string(),
            items: Vec::new(),
            subtotal: Money::zero(),
            vat_amount: Money::zero(),
            total: Money::zero(),
            status: SaleStatus::Pending,
            payments: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Appends a line and recomputes the totals.
    ///
    /// ## Errors
    /// - `InvalidSaleStatus` unless the sale is pending
    /// - `SaleTooLarge` at [`MAX_SALE_ITEMS`]
    pub fn add_item(&mut self, item: SaleItem) -> CoreResult<()> {
        self.ensure_pending()?;
        validate_sale_size(self.items.len()).map_err(|_| CoreError::SaleTooLarge {
            max: MAX_SALE_ITEMS,
        })?;

        self.items.push(item);
        if let Err(e) = self.recompute() {
            self.items.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Removes the line with `item_id` and recomputes the totals.
    ///
    /// Returns the removed line, or `ItemNotFound` if no line has that id
    /// (the sale is left untouched).
    pub fn remove_item(&mut self, item_id: &str) -> CoreResult<SaleItem> {
        self.ensure_pending()?;

        let index = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;

        let removed = self.items.remove(index);
        if let Err(e) = self.recompute() {
            self.items.insert(index, removed);
            return Err(e);
        }
        Ok(removed)
    }

    /// Returns the sale to its empty pending state.
    ///
    /// Resetting a sale that is already blank changes nothing, so repeated
    /// resets are idempotent. A sale that was used gets a fresh id, since
    /// the next sale rung up in this slot is a different transaction.
    pub fn reset(&mut self) {
        if self.is_blank() {
            return;
        }
        *self = Sale::new();
    }

    /// Records the settled payments and marks the sale completed.
    pub fn complete(&mut self, payments: Vec<Payment>) -> CoreResult<()> {
        self.ensure_pending()?;
        if payments.is_empty() {
            return Err(CoreError::NoPayments(self.id.clone()));
        }

        let now = Utc::now();
        self.payments = payments;
        self.status = SaleStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Marks a pending sale cancelled.
    pub fn cancel(&mut self) -> CoreResult<()> {
        self.ensure_pending()?;
        self.status = SaleStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fails with `InvalidSaleStatus` unless the sale is pending.
    pub fn ensure_pending(&self) -> CoreResult<()> {
        if self.status != SaleStatus::Pending {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: self.id.clone(),
                current_status: self.status,
            });
        }
        Ok(())
    }

    /// Fails unless the sale is pending and has something to pay for.
    ///
    /// A sale of only free lines has nothing to settle: every payment must
    /// be strictly positive.
    pub fn ensure_payable(&self) -> CoreResult<()> {
        self.ensure_pending()?;
        if self.items.is_empty() {
            return Err(CoreError::EmptySale);
        }
        if !self.total.is_positive() {
            return Err(CoreError::ZeroTotal(self.total));
        }
        Ok(())
    }

    /// True if the sale has no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of lines on the sale.
    #[inline]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of the payments still held against the sale.
    pub fn amount_paid(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| p.is_approved())
            .map(|p| p.amount)
            .sum()
    }

    /// Change handed back across all cash payments.
    pub fn change_given(&self) -> Money {
        self.payments.iter().filter_map(|p| p.change).sum()
    }

    /// VAT grouped by rate, highest rate first. Rates with no VAT due are
    /// left out.
    pub fn vat_breakdown(&self) -> Vec<(TaxRate, Money)> {
        let mut breakdown: Vec<(TaxRate, Money)> = Vec::new();
        for item in &self.items {
            match breakdown.iter_mut().find(|(rate, _)| *rate == item.vat_rate) {
                Some((_, amount)) => *amount += item.vat_amount,
                None => breakdown.push((item.vat_rate, item.vat_amount)),
            }
        }
        breakdown.retain(|(_, amount)| !amount.is_zero());
        breakdown.sort_by(|a, b| b.0.cmp(&a.0));
        breakdown
    }

    fn is_blank(&self) -> bool {
        self.status == SaleStatus::Pending
            && self.items.is_empty()
            && self.payments.is_empty()
            && self.completed_at.is_none()
    }

    /// Re-sums the totals over every line. Nothing is written if any sum
    /// overflows.
    fn recompute(&mut self) -> CoreResult<()> {
        let subtotal = Money::checked_sum(self.items.iter().map(|i| i.line_total))
            .ok_or(CoreError::AmountOverflow)?;
        let vat_amount = Money::checked_sum(self.items.iter().map(|i| i.vat_amount))
            .ok_or(CoreError::AmountOverflow)?;
        let total = subtotal
            .checked_add(vat_amount)
            .ok_or(CoreError::AmountOverflow)?;

        self.subtotal = subtotal;
        self.vat_amount = vat_amount;
        self.total = total;
        self.updated_at = Utc::now();
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
