//! # Receipt Printer Sinks
//!
//! Where a finished receipt goes. Printing is best-effort: a failing sink
//! never undoes a payment, it is only logged.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────────────────┐
//! │ kind         │ behaviour                                                │
//! ├──────────────┼──────────────────────────────────────────────────────────┤
//! │ log          │ emits the receipt on the `epos::receipt` tracing target  │
//! │ spool        │ writes receipt-{number}.txt into the spool directory     │
//! └──────────────┴──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::state::{PrinterKind, PrinterSettings};

/// Tracing target for printed receipts.
pub const RECEIPT_TARGET: &str = "epos::receipt";

#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("Could not write receipt to {path}: {source}")]
    Spool {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Printer task did not finish: {0}")]
    Task(String),
}

/// A sink for formatted receipts.
///
/// `print` may block; the session calls it from the blocking pool.
pub trait ReceiptPrinter: Send + Sync {
    fn print(&self, receipt_number: &str, document: &str) -> Result<(), PrinterError>;
}

/// Builds the sink named in the printer settings.
pub fn from_settings(settings: &PrinterSettings) -> Arc<dyn ReceiptPrinter> {
    match settings.kind {
        PrinterKind::Log => Arc::new(LogPrinter),
        PrinterKind::Spool => Arc::new(SpoolPrinter::new(settings.spool_dir.clone())),
    }
}

/// Prints receipts into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPrinter;

impl ReceiptPrinter for LogPrinter {
    fn print(&self, receipt_number: &str, document: &str) -> Result<(), PrinterError> {
        info!(target: RECEIPT_TARGET, receipt_number, "\n{}", document);
        Ok(())
    }
}

/// Writes each receipt to its own text file.
#[derive(Debug, Clone)]
pub struct SpoolPrinter {
    dir: PathBuf,
}

impl SpoolPrinter {
    pub fn new(dir: PathBuf) -> Self {
        SpoolPrinter { dir }
    }

    pub fn path_for(&self, receipt_number: &str) -> PathBuf {
        self.dir.join(format!("receipt-{}.txt", receipt_number))
    }
}

impl ReceiptPrinter for SpoolPrinter {
    fn print(&self, receipt_number: &str, document: &str) -> Result<(), PrinterError> {
        let path = self.path_for(receipt_number);
        let spool_err = |source| PrinterError::Spool {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(spool_err)?;
        std::fs::write(&path, document).map_err(spool_err)?;

        debug!(?path, "Receipt spooled");
        Ok(())
    }
}
