//! # Payments Configuration
//!
//! Which card provider to use, its credentials, and how long to wait for it.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     EPOS_PAYMENT_PROVIDER=stripe                                       │
//! │     EPOS_STRIPE_SECRET_KEY=sk_live_...                                 │
//! │                                                                         │
//! │  2. [payments] section of epos.toml                                    │
//! │     (loaded by the terminal together with store settings)              │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Worldpay, 30 second timeout, production base URLs                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [payments]
//! provider = "sumup"   # worldpay | sumup | stripe
//! timeout_secs = 30
//!
//! [payments.sumup]
//! api_key = "..."
//! merchant_code = "MC123"
//! affiliate_key = "..."
//! ```
//!
//! Secrets are never printed: the `Debug` output of every credential type
//! redacts them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PaymentError, PaymentResult};

// =============================================================================
// Provider Selection
// =============================================================================

/// The card provider behind the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Worldpay,
    SumUp,
    Stripe,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Worldpay => "worldpay",
            ProviderKind::SumUp => "sumup",
            ProviderKind::Stripe => "stripe",
        }
    }

    /// Production API root.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Worldpay => "https://api.worldpay.com",
            ProviderKind::SumUp => "https://api.sumup.com",
            ProviderKind::Stripe => "https://api.stripe.com",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "worldpay" => Ok(ProviderKind::Worldpay),
            "sumup" | "sum_up" => Ok(ProviderKind::SumUp),
            "stripe" => Ok(ProviderKind::Stripe),
            other => Err(PaymentError::InvalidConfig(format!(
                "Unknown payment provider: '{}'. Valid options: worldpay, sumup, stripe",
                other
            ))),
        }
    }
}

// =============================================================================
// Provider Credentials
// =============================================================================

/// Worldpay merchant credentials.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldpayCredentials {
    pub merchant_id: String,
    pub api_key: String,
    pub terminal_id: Option<String>,
    /// Overrides the production API root (sandbox, tests).
    pub base_url: Option<String>,
}

impl fmt::Debug for WorldpayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldpayCredentials")
            .field("merchant_id", &self.merchant_id)
            .field("api_key", &redact(&self.api_key))
            .field("terminal_id", &self.terminal_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// SumUp merchant credentials.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SumUpCredentials {
    pub api_key: String,
    pub merchant_code: String,
    pub affiliate_key: String,
    pub base_url: Option<String>,
}

impl fmt::Debug for SumUpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SumUpCredentials")
            .field("api_key", &redact(&self.api_key))
            .field("merchant_code", &self.merchant_code)
            .field("affiliate_key", &redact(&self.affiliate_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Stripe account keys.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeCredentials {
    pub public_key: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub base_url: Option<String>,
}

impl fmt::Debug for StripeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeCredentials")
            .field("public_key", &self.public_key)
            .field("secret_key", &redact(&self.secret_key))
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

// =============================================================================
// Payments Configuration
// =============================================================================

fn default_timeout_secs() -> u64 {
    30
}

/// Complete payments configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Provider used for card and contactless payments.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Upper bound on each charge or refund call (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub worldpay: WorldpayCredentials,

    #[serde(default)]
    pub sumup: SumUpCredentials,

    #[serde(default)]
    pub stripe: StripeCredentials,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        PaymentsConfig {
            provider: ProviderKind::default(),
            timeout_secs: default_timeout_secs(),
            worldpay: WorldpayCredentials::default(),
            sumup: SumUpCredentials::default(),
            stripe: StripeCredentials::default(),
        }
    }
}

impl PaymentsConfig {
    /// Gateway call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// API root for the selected provider.
    pub fn base_url(&self) -> &str {
        let configured = match self.provider {
            ProviderKind::Worldpay => self.worldpay.base_url.as_deref(),
            ProviderKind::SumUp => self.sumup.base_url.as_deref(),
            ProviderKind::Stripe => self.stripe.base_url.as_deref(),
        };
        configured
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> PaymentResult<()> {
        if self.timeout_secs == 0 {
            return Err(PaymentError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        let overrides = [
            &self.worldpay.base_url,
            &self.sumup.base_url,
            &self.stripe.base_url,
        ];
        for url in overrides.into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(PaymentError::InvalidConfig(format!(
                    "Provider base URL must start with http:// or https://, got: {}",
                    url
                )));
            }
        }

        let missing = match self.provider {
            ProviderKind::Worldpay => {
                self.worldpay.merchant_id.is_empty() || self.worldpay.api_key.is_empty()
            }
            ProviderKind::SumUp => {
                self.sumup.api_key.is_empty() || self.sumup.merchant_code.is_empty()
            }
            ProviderKind::Stripe => self.stripe.secret_key.is_empty(),
        };
        if missing {
            return Err(PaymentError::MissingCredentials(self.provider.to_string()));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Split out from
    /// [`apply_env_overrides`](Self::apply_env_overrides) so tests do not
    /// touch the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("EPOS_PAYMENT_PROVIDER") {
            match provider.parse() {
                Ok(parsed) => {
                    debug!(provider = %provider, "Overriding payment provider from environment");
                    self.provider = parsed;
                }
                Err(_) => warn!(provider = %provider, "Unknown payment provider in environment"),
            }
        }

        if let Some(secs) = lookup("EPOS_GATEWAY_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.timeout_secs = s;
            }
        }

        // Worldpay
        if let Some(v) = lookup("EPOS_WORLDPAY_MERCHANT_ID") {
            self.worldpay.merchant_id = v;
        }
        if let Some(v) = lookup("EPOS_WORLDPAY_API_KEY") {
            self.worldpay.api_key = v;
        }
        if let Some(v) = lookup("EPOS_WORLDPAY_TERMINAL_ID") {
            self.worldpay.terminal_id = Some(v);
        }
        if let Some(v) = lookup("EPOS_WORLDPAY_BASE_URL") {
            self.worldpay.base_url = Some(v);
        }

        // SumUp
        if let Some(v) = lookup("EPOS_SUMUP_API_KEY") {
            self.sumup.api_key = v;
        }
        if let Some(v) = lookup("EPOS_SUMUP_MERCHANT_CODE") {
            self.sumup.merchant_code = v;
        }
        if let Some(v) = lookup("EPOS_SUMUP_AFFILIATE_KEY") {
            self.sumup.affiliate_key = v;
        }
        if let Some(v) = lookup("EPOS_SUMUP_BASE_URL") {
            self.sumup.base_url = Some(v);
        }

        // Stripe
        if let Some(v) = lookup("EPOS_STRIPE_PUBLIC_KEY") {
            self.stripe.public_key = v;
        }
        if let Some(v) = lookup("EPOS_STRIPE_SECRET_KEY") {
            self.stripe.secret_key = v;
        }
        if let Some(v) = lookup("EPOS_STRIPE_WEBHOOK_SECRET") {
            self.stripe.webhook_secret = v;
        }
        if let Some(v) = lookup("EPOS_STRIPE_BASE_URL") {
            self.stripe.base_url = Some(v);
        }
    }
}
