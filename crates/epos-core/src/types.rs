//! # Domain Types
//!
//! Payment and product records shared by every layer of Sterling EPOS.
//! The [`Sale`](crate::sale::Sale) aggregate lives in its own module.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Payment      │   │SplitPaymentItem │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id (UUID)      │   │  method         │       │
//! │  │  name           │   │  method         │   │  amount         │       │
//! │  │  price          │   │  amount         │   │  reference?     │       │
//! │  │  vat_rate_id    │   │  reference?     │   └─────────────────┘       │
//! │  └─────────────────┘   │  status         │                              │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │   SaleStatus    │   │ PaymentMethod   │       │
//! │  │  bps (u32)      │   │  Pending        │   │  Card           │       │
//! │  │  2000 = 20%     │   │  Completed      │   │  Cash           │       │
//! │  └─────────────────┘   │  Cancelled      │   │  Contactless    │       │
//! │                        └─────────────────┘   │  BankTransfer   │       │
//! │                                              │  Voucher        │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// A VAT percentage held in basis points (1 bps = 0.01%).
///
/// 2000 bps = 20% (UK standard rate), 500 bps = 5% (reduced rate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a whole percentage.
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        TaxRate(percent * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

/// Renders as a percentage with trailing zeros trimmed: `20%`, `5%`, `17.5%`.
impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}%", whole)
        } else if frac % 10 == 0 {
            write!(f, "{}.{}%", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}%", whole, frac)
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product tile on the POS grid.
///
/// The grid hands products to the sale as they are tapped; the sale snapshots
/// the price and VAT rate into a [`SaleItem`](crate::sale::SaleItem).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Money,
    /// Id into the VAT rate table. Unknown ids resolve to the default rate.
    pub vat_rate_id: String,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Items are being rung up, or payment has not yet succeeded.
    #[default]
    Pending,
    /// Every payment settled.
    Completed,
    /// Abandoned, or failed beyond recovery.
    Cancelled,
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaleStatus::Pending => write!(f, "pending"),
            SaleStatus::Completed => write!(f, "completed"),
            SaleStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a payment was taken.
///
/// "Split" is deliberately absent: it is a way of choosing several of these,
/// never the method of a recorded payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
    Contactless,
    BankTransfer,
    Voucher,
}

impl PaymentMethod {
    /// All methods, in the order the payment panel shows them.
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Card,
        PaymentMethod::Cash,
        PaymentMethod::Contactless,
        PaymentMethod::BankTransfer,
        PaymentMethod::Voucher,
    ];

    /// True for methods that go through a card provider and can be refunded
    /// through it.
    #[inline]
    pub const fn is_gateway_backed(&self) -> bool {
        matches!(self, PaymentMethod::Card | PaymentMethod::Contactless)
    }

    /// Wire name, as serialized.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Contactless => "contactless",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Voucher => "voucher",
        }
    }

    /// Human label for receipts and the terminal.
    pub const fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Contactless => "Contactless",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Voucher => "Voucher",
        }
    }

    /// Builds a reference for a payment that has no provider round trip,
    /// e.g. `CASH-1718000000000`.
    pub fn local_reference(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}",
            self.as_str().to_ascii_uppercase(),
            at.timestamp_millis()
        )
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "cash" => Ok(PaymentMethod::Cash),
            "contactless" | "nfc" => Ok(PaymentMethod::Contactless),
            "bank_transfer" | "bank-transfer" | "bank" => Ok(PaymentMethod::BankTransfer),
            "voucher" => Ok(PaymentMethod::Voucher),
            _ => Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: PaymentMethod::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Approved,
    Declined,
    Refunded,
}

// =============================================================================
// Payment
// =============================================================================

/// A settled (or reversed) payment towards a sale.
/// A sale carries several of these after a split payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub method: PaymentMethod,
    pub amount: Money,
    /// Provider reference for card/contactless, local or voucher reference
    /// otherwise.
    pub reference: Option<String>,
    pub status: PaymentStatus,
    /// For cash: what the customer handed over.
    pub tendered: Option<Money>,
    /// For cash: change returned to the customer.
    pub change: Option<Money>,
    #[ts(as = "String")]
    pub processed_at: DateTime<Utc>,
}

impl Payment {
    /// Creates an approved payment stamped with the current time.
    pub fn approved(method: PaymentMethod, amount: Money, reference: Option<String>) -> Self {
        Payment {
            id: Uuid::new_v4().to_string(),
            method,
            amount,
            reference,
            status: PaymentStatus::Approved,
            tendered: None,
            change: None,
            processed_at: Utc::now(),
        }
    }

    /// Creates an approved payment for a method with no provider round trip,
    /// with a locally generated reference.
    pub fn local(method: PaymentMethod, amount: Money) -> Self {
        let now = Utc::now();
        let mut payment = Payment::approved(method, amount, Some(method.local_reference(now)));
        payment.processed_at = now;
        payment
    }

    /// Records the cash handed over and the change due.
    pub fn with_tender(mut self, tendered: Money, change: Money) -> Self {
        self.tendered = Some(tendered);
        self.change = Some(change);
        self
    }

    /// Marks the payment as reversed.
    pub fn mark_refunded(&mut self) {
        self.status = PaymentStatus::Refunded;
    }

    /// True while the money is still held against the sale.
    #[inline]
    pub fn is_approved(&self) -> bool {
        self.status == PaymentStatus::Approved
    }
}

// =============================================================================
// Split Payment Item
// =============================================================================

/// One leg of a split payment as entered by the operator. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SplitPaymentItem {
    pub method: PaymentMethod,
    pub amount: Money,
    /// Voucher code, when the leg is a voucher.
    #[serde(default)]
    pub reference: Option<String>,
}

impl SplitPaymentItem {
    pub fn new(method: PaymentMethod, amount: Money) -> Self {
        SplitPaymentItem {
            method,
            amount,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
