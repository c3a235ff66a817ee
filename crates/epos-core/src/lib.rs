//! # epos-core: Pure Business Logic for Sterling EPOS
//!
//! This crate holds the sale and VAT logic as pure functions with zero I/O
//! dependencies. Payment providers, printers and the operator terminal all
//! live in crates above it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sterling EPOS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Operator Terminal (apps/terminal)               │   │
//! │  │    add item ──► remove item ──► pay / split ──► print receipt   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              epos-payments (gateways + settlement)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ epos-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────────────┐   │   │
//! │  │   │  money  │  │   vat   │  │  sale   │  │ receipt/validate│   │   │
//! │  │   │  Money  │  │ VatRate │  │  Sale   │  │  text layout    │   │   │
//! │  │   │ (pence) │  │  table  │  │SaleItem │  │  input rules    │   │   │
//! │  │   └─────────┘  └─────────┘  └─────────┘  └─────────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO PRINTER • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - GBP amounts as integer pence
//! - [`vat`] - UK VAT rate table and calculator
//! - [`types`] - Payment and product records
//! - [`sale`] - The Sale aggregate and its line items
//! - [`receipt`] - Plain-text receipt layout
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use epos_core::money::Money;
//! use epos_core::sale::{Sale, SaleItem};
//!
//! let mut sale = Sale::new();
//! let item = SaleItem::new("1", Money::from_pence(999), "standard").unwrap();
//! sale.add_item(item).unwrap();
//!
//! // £9.99 at 20% = £1.998 → £2.00
//! assert_eq!(sale.vat_amount.pence(), 200);
//! assert_eq!(sale.total.pence(), 1199);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod receipt;
pub mod sale;
pub mod types;
pub mod validation;
pub mod vat;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use sale::{Sale, SaleItem};
pub use types::*;
pub use vat::{vat_amount, VatRate, UK_VAT_RATES};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// The only currency the system settles in.
pub const CURRENCY_CODE: &str = "GBP";

/// Maximum line items allowed in a single sale.
pub const MAX_SALE_ITEMS: usize = 100;

/// Highest unit price a line may carry (£1,000,000). A full sale at this
/// price plus 100% VAT stays far inside `i64` pence.
pub const MAX_UNIT_PRICE: Money = Money::from_pence(100_000_000);

/// How far a split-payment sum may drift from the sale total (one penny).
pub const SPLIT_TOLERANCE: Money = Money::from_pence(1);
