//! # State Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────────────┐        ┌──────────────────────────────────┐  │
//! │  │   AppConfig          │        │   PosSession                     │  │
//! │  │                      │ builds │                                  │  │
//! │  │  store details       │───────►│  Arc<Mutex<Sale>>                │  │
//! │  │  printer settings    │        │  settling flag                   │  │
//! │  │  payments config     │        │  single / split settlement       │  │
//! │  └──────────────────────┘        │  receipt printer                 │  │
//! │                                  └──────────────────────────────────┘  │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • AppConfig: read-only after startup                                  │
//! │  • PosSession: sale behind a Mutex, never held across a gateway call   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod session;

pub use config::{AppConfig, ConfigError, PrinterKind, PrinterSettings};
pub use session::{PosSession, SettledSale};
