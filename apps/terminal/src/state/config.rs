//! # Terminal Configuration
//!
//! Loaded once at startup and read-only afterwards.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`EPOS_*`)
//! 2. Config file (`epos.toml`, or the path in `EPOS_CONFIG`)
//! 3. Defaults (this file)
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! name = "Corner Shop Ltd"
//! address = "1 High Street"
//! city = "Leeds"
//! postcode = "LS1 1AA"
//! phone = "0113 000 0000"
//! vat_number = "GB123456789"
//! company_number = "01234567"
//!
//! [printer]
//! kind = "spool"           # log | spool
//! spool_dir = "/var/spool/epos"
//! paper_width = 42
//!
//! [payments]
//! provider = "worldpay"
//!
//! [payments.worldpay]
//! merchant_id = "..."
//! api_key = "..."
//! ```

use std::path::PathBuf;

use epos_core::receipt::{StoreDetails, MIN_RECEIPT_WIDTH};
use epos_payments::{PaymentError, PaymentsConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Payments(#[from] PaymentError),
}

// =============================================================================
// Printer Settings
// =============================================================================

/// Receipt sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterKind {
    /// Receipts go to the log (development).
    #[default]
    Log,
    /// Receipts are written as text files to a spool directory.
    Spool,
}

impl std::str::FromStr for PrinterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(PrinterKind::Log),
            "spool" => Ok(PrinterKind::Spool),
            other => Err(ConfigError::Invalid(format!(
                "Unknown printer: '{}'. Valid options: log, spool",
                other
            ))),
        }
    }
}

fn default_spool_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "sterling", "epos")
        .map(|dirs| dirs.data_dir().join("receipts"))
        .unwrap_or_else(|| PathBuf::from("receipts"))
}

fn default_paper_width() -> usize {
    42
}

/// Receipt printer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterSettings {
    #[serde(default)]
    pub kind: PrinterKind,

    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,

    /// Paper width in characters (typically 32, 42, or 48)
    #[serde(default = "default_paper_width")]
    pub paper_width: usize,
}

impl Default for PrinterSettings {
    fn default() -> Self {
        PrinterSettings {
            kind: PrinterKind::default(),
            spool_dir: default_spool_dir(),
            paper_width: default_paper_width(),
        }
    }
}

// =============================================================================
// App Configuration
// =============================================================================

/// Complete terminal configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Printed on every receipt.
    #[serde(default)]
    pub store: StoreDetails,

    #[serde(default)]
    pub printer: PrinterSettings,

    #[serde(default)]
    pub payments: PaymentsConfig,
}

impl AppConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Loading Order
    /// 1. Start with defaults
    /// 2. Load from config file if it exists
    /// 3. Override with environment variables
    /// 4. Validate
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var("EPOS_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.printer.paper_width < MIN_RECEIPT_WIDTH {
            return Err(ConfigError::Invalid(format!(
                "paper_width must be at least {} characters, got {}",
                MIN_RECEIPT_WIDTH, self.printer.paper_width
            )));
        }

        self.payments.validate()?;
        Ok(())
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("EPOS_STORE_NAME") {
            self.store.name = name;
        }
        if let Some(vat_number) = lookup("EPOS_VAT_NUMBER") {
            self.store.vat_number = vat_number;
        }

        if let Some(printer) = lookup("EPOS_PRINTER") {
            match printer.parse() {
                Ok(kind) => {
                    debug!(printer = %printer, "Overriding printer from environment");
                    self.printer.kind = kind;
                }
                Err(_) => warn!(printer = %printer, "Unknown printer in environment"),
            }
        }
        if let Some(dir) = lookup("EPOS_SPOOL_DIR") {
            self.printer.spool_dir = PathBuf::from(dir);
        }

        self.payments.apply_overrides(&lookup);
    }

    /// Default config file path.
    ///
    /// - **Linux**: `~/.config/epos/epos.toml`
    /// - **macOS**: `~/Library/Application Support/com.sterling.epos/epos.toml`
    /// - **Windows**: `%APPDATA%\sterling\epos\config\epos.toml`
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "sterling", "epos")
            .map(|dirs| dirs.config_dir().join("epos.toml"))
    }
}
