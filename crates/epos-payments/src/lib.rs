//! # epos-payments: Payment Settlement for Sterling EPOS
//!
//! Takes a pending [`Sale`](epos_core::Sale) and produces the payments that
//! settle it, either with one method or split across several.
//!
//! ## Settlement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Settlement Flow                                  │
//! │                                                                         │
//! │  operator picks a method                                               │
//! │         │                                                               │
//! │         ├── single ──► SinglePaymentProcessor                          │
//! │         │                 ├── cash ──► change = paid − total           │
//! │         │                 ├── card / contactless ──► gateway.charge    │
//! │         │                 └── bank transfer / voucher ──► local ref    │
//! │         │                                                               │
//! │         └── split ──► SplitPaymentCoordinator                          │
//! │                           1. validate Σ legs == total (±1p)            │
//! │                           2. settle legs in order                      │
//! │                           3. on failure: refund settled card legs      │
//! │                              in the order they were taken              │
//! │                                                                         │
//! │  PaymentGateway (trait)                                                │
//! │    ├── HttpGateway: Worldpay | SumUp | Stripe, picked by config        │
//! │    └── FakeGateway: scripted, for tests                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Outcomes
//! - Precondition failures (wrong currency, amounts that do not add up,
//!   too little tendered) happen before any provider is contacted.
//! - A split that fails part way and is fully unwound returns
//!   [`PaymentError::SettlementFailed`].
//! - A split whose unwinding itself fails returns
//!   [`PaymentError::ReversalFailed`] and is logged on the
//!   `epos::reconciliation` target for manual follow-up.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod single;

pub use config::{PaymentsConfig, ProviderKind};
pub use coordinator::{Compensation, CompensationAction, SplitPaymentCoordinator};
pub use error::{GatewayError, PaymentError, PaymentResult, ReversalFailure};
pub use gateway::http::HttpGateway;
pub use gateway::{PaymentGateway, RefundResult};
pub use single::SinglePaymentProcessor;

/// Tracing target for events that need a human to reconcile.
pub const RECONCILIATION_TARGET: &str = "epos::reconciliation";
