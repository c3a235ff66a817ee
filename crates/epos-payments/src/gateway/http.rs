//! # HTTP Gateway
//!
//! [`PaymentGateway`] over the Worldpay, SumUp and Stripe REST APIs. The
//! provider is picked once, from configuration, when the gateway is built.
//!
//! ## Provider Wire Shapes
//! ```text
//! ┌───────────┬──────────────────────────────┬──────────┬──────────┬──────────┐
//! │ provider  │ charge endpoint              │ amount   │ auth     │ success  │
//! ├───────────┼──────────────────────────────┼──────────┼──────────┼──────────┤
//! │ worldpay  │ POST /v1/payments      JSON  │ pounds   │ bearer   │ SUCCESS  │
//! │ sumup     │ POST /v0.1/payments    JSON  │ pounds   │ bearer   │ PAID     │
//! │ stripe    │ POST /v1/payment_intents form│ pence    │ basic    │ succeeded│
//! └───────────┴──────────────────────────────┴──────────┴──────────┴──────────┘
//!
//! refunds:
//!   worldpay  POST /v1/payments/{ref}/refunds     SUCCESS   ({ref} percent-encoded)
//!   sumup     POST /v0.1/payments/{ref}/refunds   REFUNDED
//!   stripe    POST /v1/refunds                    succeeded
//! ```
//!
//! Every call is bounded by the configured timeout. The response mapping
//! lives in plain functions ([`interpret_charge`], [`interpret_refund`]) so
//! each provider's quirks can be tested without a network.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use epos_core::validation::validate_payment_amount;
use epos_core::{Money, Payment, PaymentMethod, ValidationError, CURRENCY_CODE};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{ensure_gbp, PaymentGateway, RefundResult};
use crate::config::{
    PaymentsConfig, ProviderKind, StripeCredentials, SumUpCredentials, WorldpayCredentials,
};
use crate::error::{GatewayError, PaymentError, PaymentResult};

// =============================================================================
// Gateway
// =============================================================================

/// The configured provider and its credentials.
#[derive(Debug, Clone)]
enum Provider {
    Worldpay(WorldpayCredentials),
    SumUp(SumUpCredentials),
    Stripe(StripeCredentials),
}

impl Provider {
    fn kind(&self) -> ProviderKind {
        match self {
            Provider::Worldpay(_) => ProviderKind::Worldpay,
            Provider::SumUp(_) => ProviderKind::SumUp,
            Provider::Stripe(_) => ProviderKind::Stripe,
        }
    }
}

/// Card gateway backed by a provider's REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    provider: Provider,
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpGateway {
    /// Builds the gateway for the provider selected in `config`.
    pub fn from_config(config: &PaymentsConfig) -> PaymentResult<Self> {
        config.validate()?;

        let provider = match config.provider {
            ProviderKind::Worldpay => Provider::Worldpay(config.worldpay.clone()),
            ProviderKind::SumUp => Provider::SumUp(config.sumup.clone()),
            ProviderKind::Stripe => Provider::Stripe(config.stripe.clone()),
        };

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PaymentError::InvalidConfig(format!("HTTP client: {}", e)))?;

        info!(
            provider = %config.provider,
            base_url = %config.base_url(),
            timeout_secs = config.timeout_secs,
            "Payment gateway ready"
        );

        Ok(HttpGateway {
            provider,
            base_url: config.base_url().to_string(),
            client,
            timeout: config.timeout(),
        })
    }

    /// Replaces the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn charge_request(&self, amount: Money) -> reqwest::RequestBuilder {
        match &self.provider {
            Provider::Worldpay(c) => self
                .client
                .post(self.url("/v1/payments"))
                .bearer_auth(&c.api_key)
                .json(&worldpay_charge_body(c, amount)),
            Provider::SumUp(c) => self
                .client
                .post(self.url("/v0.1/payments"))
                .bearer_auth(&c.api_key)
                .json(&sumup_charge_body(c, amount)),
            Provider::Stripe(c) => self
                .client
                .post(self.url("/v1/payment_intents"))
                .basic_auth(&c.secret_key, None::<&str>)
                .form(&stripe_charge_form(amount)),
        }
    }

    fn refund_request(&self, amount: Money, reference: &str) -> reqwest::RequestBuilder {
        match &self.provider {
            Provider::Worldpay(c) => self
                .client
                .post(self.url(&format!("/v1/payments/{}/refunds", path_segment(reference))))
                .bearer_auth(&c.api_key)
                .json(&refund_body(amount)),
            Provider::SumUp(c) => self
                .client
                .post(self.url(&format!("/v0.1/payments/{}/refunds", path_segment(reference))))
                .bearer_auth(&c.api_key)
                .json(&refund_body(amount)),
            Provider::Stripe(c) => self
                .client
                .post(self.url("/v1/refunds"))
                .basic_auth(&c.secret_key, None::<&str>)
                .form(&stripe_refund_form(amount, reference)),
        }
    }

    /// Sends a request and reads the whole body, within the timeout.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), GatewayError> {
        let call = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        match timeout(self.timeout, call).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(e)) => Err(GatewayError::Transport {
                provider: self.name().to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(GatewayError::Timeout {
                provider: self.name().to_string(),
                after_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    async fn charge(&self, amount: Money, currency: &str) -> PaymentResult<Payment> {
        ensure_gbp(currency)?;
        validate_payment_amount(amount)?;

        debug!(provider = %self.kind(), amount = %amount, "Charging card");

        let outcome = match self.send(self.charge_request(amount)).await {
            Ok((status, body)) => interpret_charge(self.kind(), status, &body),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(reference) => {
                info!(provider = %self.kind(), amount = %amount, reference = %reference, "Charge approved");
                Ok(Payment::approved(PaymentMethod::Card, amount, Some(reference)))
            }
            Err(e) => {
                warn!(provider = %self.kind(), amount = %amount, error = %e, "Charge failed");
                Err(e.into())
            }
        }
    }

    async fn refund(
        &self,
        amount: Money,
        reference: &str,
        currency: &str,
    ) -> PaymentResult<RefundResult> {
        ensure_gbp(currency)?;
        validate_payment_amount(amount)?;
        if reference.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "refund reference".to_string(),
            }
            .into());
        }

        debug!(provider = %self.kind(), amount = %amount, reference = %reference, "Refunding charge");

        let result = match self.send(self.refund_request(amount, reference)).await {
            Ok((status, body)) => interpret_refund(self.kind(), status, &body),
            Err(e) => RefundResult::failed(e.to_string()),
        };

        if result.success {
            info!(provider = %self.kind(), amount = %amount, refund_reference = %result.reference, "Refund accepted");
        } else {
            warn!(
                provider = %self.kind(),
                amount = %amount,
                reference = %reference,
                error = ?result.error_message,
                "Refund not accepted"
            );
        }

        Ok(result)
    }
}

// =============================================================================
// Request Bodies
// =============================================================================

fn worldpay_charge_body(credentials: &WorldpayCredentials, amount: Money) -> Value {
    let mut body = json!({
        "merchantId": credentials.merchant_id,
        "amount": amount.to_major_units(),
        "currency": CURRENCY_CODE,
        "paymentMethod": "CARD",
        "captureMode": "AUTO",
    });
    if let Some(terminal_id) = &credentials.terminal_id {
        body["terminalId"] = json!(terminal_id);
    }
    body
}

fn sumup_charge_body(credentials: &SumUpCredentials, amount: Money) -> Value {
    json!({
        "amount": amount.to_major_units(),
        "currency": CURRENCY_CODE,
        "merchantCode": credentials.merchant_code,
    })
}

fn refund_body(amount: Money) -> Value {
    json!({
        "amount": amount.to_major_units(),
        "currency": CURRENCY_CODE,
    })
}

/// Percent-encodes a provider reference for use as one URL path segment.
/// Only RFC 3986 unreserved characters pass through.
fn path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn stripe_charge_form(amount: Money) -> Vec<(&'static str, String)> {
    vec![
        ("amount", amount.pence().to_string()),
        ("currency", CURRENCY_CODE.to_lowercase()),
        ("payment_method_types[]", "card".to_string()),
        ("payment_method_types[]", "link".to_string()),
    ]
}

fn stripe_refund_form(amount: Money, payment_intent: &str) -> Vec<(&'static str, String)> {
    vec![
        ("payment_intent", payment_intent.to_string()),
        ("amount", amount.pence().to_string()),
    ]
}

// =============================================================================
// Response Mapping
// =============================================================================

/// The fields we read from any provider's JSON answer. Worldpay and SumUp
/// report errors in `errorMessage`, Stripe in `error.message`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProviderResponse {
    id: Option<String>,
    status: Option<String>,
    reference: Option<String>,
    error_message: Option<String>,
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderErrorBody {
    message: Option<String>,
}

impl ProviderResponse {
    fn error_text(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .or_else(|| self.error.as_ref().and_then(|e| e.message.as_deref()))
    }

    fn status_is(&self, expected: &str) -> bool {
        self.status.as_deref() == Some(expected)
    }
}

fn charge_success_status(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Worldpay => "SUCCESS",
        ProviderKind::SumUp => "PAID",
        ProviderKind::Stripe => "succeeded",
    }
}

fn refund_success_status(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Worldpay => "SUCCESS",
        ProviderKind::SumUp => "REFUNDED",
        ProviderKind::Stripe => "succeeded",
    }
}

fn fallback_refund_reference(kind: ProviderKind) -> String {
    let prefix = match kind {
        ProviderKind::Worldpay => "WP",
        ProviderKind::SumUp => "SU",
        ProviderKind::Stripe => "ST",
    };
    format!("REF-{}-{}", prefix, Utc::now().timestamp_millis())
}

/// Maps a charge response onto the charge reference, or the reason there is
/// none.
///
/// A charge the provider approved but did not identify is rejected: without
/// a reference it could never be refunded.
pub fn interpret_charge(
    kind: ProviderKind,
    http_status: u16,
    body: &str,
) -> Result<String, GatewayError> {
    let provider = kind.to_string();

    if http_status >= 500 {
        return Err(GatewayError::Unavailable {
            provider,
            status: http_status,
        });
    }

    let response: ProviderResponse =
        serde_json::from_str(body).map_err(|e| GatewayError::InvalidResponse {
            provider: provider.clone(),
            message: format!("unreadable body (HTTP {}): {}", http_status, e),
        })?;

    if !response.status_is(charge_success_status(kind)) {
        let message = response.error_text().unwrap_or("Payment failed").to_string();
        return Err(GatewayError::Declined { provider, message });
    }

    // Stripe identifies the charge by the payment intent id
    let reference = match kind {
        ProviderKind::Stripe => response.id,
        _ => response.reference.or(response.id),
    };

    reference
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| GatewayError::InvalidResponse {
            provider,
            message: "approved charge carried no reference".to_string(),
        })
}

/// Maps a refund response onto a [`RefundResult`]. Never fails.
pub fn interpret_refund(kind: ProviderKind, http_status: u16, body: &str) -> RefundResult {
    let response: ProviderResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            return RefundResult::failed(format!(
                "unreadable {} refund response (HTTP {}): {}",
                kind, http_status, e
            ))
        }
    };

    let success = response.status_is(refund_success_status(kind));
    let error_message = match response.error_text() {
        Some(text) => Some(text.to_string()),
        None if !success => Some(format!("{} did not accept the refund", kind)),
        None => None,
    };
    let reference = match kind {
        ProviderKind::Stripe => response.id,
        _ => response.reference,
    }
    .unwrap_or_else(|| fallback_refund_reference(kind));

    RefundResult {
        success,
        reference,
        error_message,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn worldpay_config(base_url: &str) -> PaymentsConfig {
        let mut config = PaymentsConfig::default();
        config.provider = ProviderKind::Worldpay;
        config.worldpay.merchant_id = "M1".into();
        config.worldpay.api_key = "wp_key".into();
        config.worldpay.terminal_id = Some("T1".into());
        config.worldpay.base_url = Some(base_url.into());
        config
    }

    fn stripe_config(base_url: &str) -> PaymentsConfig {
        let mut config = PaymentsConfig::default();
        config.provider = ProviderKind::Stripe;
        config.stripe.secret_key = "sk_test_1".into();
        config.stripe.base_url = Some(base_url.into());
        config
    }

    fn sumup_config(base_url: &str) -> PaymentsConfig {
        let mut config = PaymentsConfig::default();
        config.provider = ProviderKind::SumUp;
        config.sumup.api_key = "su_key".into();
        config.sumup.merchant_code = "MC1".into();
        config.sumup.base_url = Some(base_url.into());
        config
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.trim().eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    /// Answers exactly one request with `status_line` and a JSON `body`,
    /// and hands back the raw request it received.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&raw).into_owned()
        });

        (base_url, handle)
    }

    /// A base URL on which nothing is listening.
    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    /// A base URL that accepts connections and never answers.
    async fn silent_listener() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    // -------------------------------------------------------------------------
    // Response mapping
    // -------------------------------------------------------------------------

    #[test]
    fn test_charge_success_per_provider() {
        let wp = r#"{"id":"wp_1","status":"SUCCESS","reference":"WP-REF-1"}"#;
        assert_eq!(interpret_charge(ProviderKind::Worldpay, 200, wp).unwrap(), "WP-REF-1");

        let su = r#"{"id":"su_1","status":"PAID","reference":"SU-REF-1"}"#;
        assert_eq!(interpret_charge(ProviderKind::SumUp, 200, su).unwrap(), "SU-REF-1");

        let st = r#"{"id":"pi_123","object":"payment_intent","status":"succeeded"}"#;
        assert_eq!(interpret_charge(ProviderKind::Stripe, 200, st).unwrap(), "pi_123");
    }

    #[test]
    fn test_charge_falls_back_to_provider_id() {
        let body = r#"{"id":"wp_77","status":"SUCCESS"}"#;
        assert_eq!(interpret_charge(ProviderKind::Worldpay, 200, body).unwrap(), "wp_77");
    }

    #[test]
    fn test_charge_success_without_reference_is_rejected() {
        let err = interpret_charge(ProviderKind::SumUp, 200, r#"{"status":"PAID"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse { .. }));
    }

    #[test]
    fn test_charge_declines() {
        let wp = r#"{"status":"FAILED","errorMessage":"Insufficient funds"}"#;
        let err = interpret_charge(ProviderKind::Worldpay, 200, wp).unwrap_err();
        assert!(err.is_declined());
        assert!(err.to_string().contains("Insufficient funds"));

        let st = r#"{"error":{"type":"card_error","message":"Your card was declined."}}"#;
        let err = interpret_charge(ProviderKind::Stripe, 402, st).unwrap_err();
        assert_eq!(
            err,
            GatewayError::Declined {
                provider: "stripe".into(),
                message: "Your card was declined.".into(),
            }
        );

        // Wrong provider vocabulary is not a success
        let err = interpret_charge(ProviderKind::SumUp, 200, r#"{"status":"SUCCESS","id":"x"}"#)
            .unwrap_err();
        assert!(err.is_declined());
    }

    #[test]
    fn test_charge_infrastructure_failures() {
        let err = interpret_charge(ProviderKind::Worldpay, 503, "").unwrap_err();
        assert_eq!(
            err,
            GatewayError::Unavailable {
                provider: "worldpay".into(),
                status: 503,
            }
        );
        assert!(err.is_retryable());

        let err = interpret_charge(ProviderKind::Worldpay, 200, "<html>").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse { .. }));
    }

    #[test]
    fn test_refund_mapping() {
        let su = interpret_refund(
            ProviderKind::SumUp,
            200,
            r#"{"status":"REFUNDED","reference":"RF-1"}"#,
        );
        assert_eq!(su, RefundResult::succeeded("RF-1"));

        let wp = interpret_refund(ProviderKind::Worldpay, 200, r#"{"status":"SUCCESS"}"#);
        assert!(wp.success);
        assert!(wp.reference.starts_with("REF-WP-"));

        let st = interpret_refund(ProviderKind::Stripe, 200, r#"{"id":"re_1","status":"succeeded"}"#);
        assert_eq!(st, RefundResult::succeeded("re_1"));

        let st_failed = interpret_refund(
            ProviderKind::Stripe,
            400,
            r#"{"error":{"message":"Charge pi_1 has already been refunded."}}"#,
        );
        assert!(!st_failed.success);
        assert!(st_failed.reference.starts_with("REF-ST-"));
        assert_eq!(
            st_failed.error_message.as_deref(),
            Some("Charge pi_1 has already been refunded.")
        );

        let garbage = interpret_refund(ProviderKind::SumUp, 502, "Bad Gateway");
        assert!(!garbage.success);
        assert!(garbage.reference.starts_with("ERROR-"));
    }

    #[test]
    fn test_request_bodies() {
        let mut creds = WorldpayCredentials {
            merchant_id: "M1".into(),
            api_key: "k".into(),
            terminal_id: None,
            base_url: None,
        };
        let body = worldpay_charge_body(&creds, Money::from_pence(1199));
        assert_eq!(body["merchantId"], "M1");
        assert_eq!(body["amount"], 11.99);
        assert_eq!(body["currency"], "GBP");
        assert_eq!(body["captureMode"], "AUTO");
        assert!(body.get("terminalId").is_none());

        creds.terminal_id = Some("T1".into());
        assert_eq!(worldpay_charge_body(&creds, Money::from_pence(1))["terminalId"], "T1");

        let form = stripe_charge_form(Money::from_pence(1199));
        assert!(form.contains(&("amount", "1199".to_string())));
        assert!(form.contains(&("currency", "gbp".to_string())));
        assert!(form.contains(&("payment_method_types[]", "link".to_string())));
    }

    // -------------------------------------------------------------------------
    // Over the wire
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_worldpay_charge_round_trip() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"id":"wp_1","status":"SUCCESS","reference":"WP-REF-1"}"#).await;
        let gateway = HttpGateway::from_config(&worldpay_config(&base_url)).unwrap();

        let payment = gateway.charge(Money::from_pence(1199), "GBP").await.unwrap();
        assert_eq!(payment.reference.as_deref(), Some("WP-REF-1"));
        assert_eq!(payment.method, PaymentMethod::Card);
        assert_eq!(payment.amount.pence(), 1199);
        assert!(payment.is_approved());

        let request = server.await.unwrap();
        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /v1/payments HTTP/1.1"));
        assert!(lower.contains("authorization: bearer wp_key"));
        assert!(request.contains(r#""merchantId":"M1""#));
        assert!(request.contains(r#""terminalId":"T1""#));
        assert!(request.contains(r#""amount":11.99"#));
    }

    #[tokio::test]
    async fn test_stripe_charge_round_trip() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"id":"pi_9","status":"succeeded"}"#).await;
        let gateway = HttpGateway::from_config(&stripe_config(&base_url)).unwrap();

        let payment = gateway.charge(Money::from_pence(4999), "GBP").await.unwrap();
        assert_eq!(payment.reference.as_deref(), Some("pi_9"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/payment_intents HTTP/1.1"));
        assert!(request.to_lowercase().contains("authorization: basic "));
        assert!(request.contains("amount=4999"));
        assert!(request.contains("currency=gbp"));
    }

    #[tokio::test]
    async fn test_sumup_refund_round_trip() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"status":"REFUNDED","reference":"RF-9"}"#).await;
        let gateway = HttpGateway::from_config(&sumup_config(&base_url)).unwrap();

        let result = gateway
            .refund(Money::from_pence(6000), "TX-1", "GBP")
            .await
            .unwrap();
        assert_eq!(result, RefundResult::succeeded("RF-9"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v0.1/payments/TX-1/refunds HTTP/1.1"));
        assert!(request.contains(r#""amount":60.0"#));
    }

    #[test]
    fn test_path_segment_encoding() {
        assert_eq!(path_segment("WP-REF_1.a~b"), "WP-REF_1.a~b");
        assert_eq!(path_segment("a/b?c#d"), "a%2Fb%3Fc%23d");
        assert_eq!(path_segment("../x y"), "..%2Fx%20y");
        assert_eq!(path_segment("£"), "%C2%A3");
    }

    #[tokio::test]
    async fn test_worldpay_refund_reference_stays_in_one_segment() {
        let (base_url, server) = serve_once("200 OK", r#"{"status":"SUCCESS"}"#).await;
        let gateway = HttpGateway::from_config(&worldpay_config(&base_url)).unwrap();

        let result = gateway
            .refund(Money::from_pence(500), "a/b?c#d", "GBP")
            .await
            .unwrap();
        assert!(result.success);

        let request = server.await.unwrap();
        assert!(
            request.starts_with("POST /v1/payments/a%2Fb%3Fc%23d/refunds HTTP/1.1"),
            "{request}"
        );
    }

    #[tokio::test]
    async fn test_provider_server_error() {
        let (base_url, _server) = serve_once("503 Service Unavailable", "{}").await;
        let gateway = HttpGateway::from_config(&worldpay_config(&base_url)).unwrap();

        let err = gateway.charge(Money::from_pence(100), "GBP").await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Gateway(GatewayError::Unavailable { status: 503, .. })
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_preconditions_checked_before_any_call() {
        let gateway = HttpGateway::from_config(&worldpay_config(&closed_port().await)).unwrap();

        let err = gateway.charge(Money::from_pence(100), "EUR").await.unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedCurrency(_)));

        let err = gateway.charge(Money::zero(), "GBP").await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));

        let err = gateway.refund(Money::from_pence(100), "", "GBP").await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let gateway = HttpGateway::from_config(&sumup_config(&closed_port().await)).unwrap();

        let err = gateway.charge(Money::from_pence(100), "GBP").await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(GatewayError::Transport { .. })));

        // Refunds report transport failure instead of raising it
        let result = gateway
            .refund(Money::from_pence(100), "TX-1", "GBP")
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.reference.starts_with("ERROR-"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let gateway = HttpGateway::from_config(&stripe_config(&silent_listener().await))
            .unwrap()
            .with_timeout(Duration::from_millis(200));

        let err = gateway.charge(Money::from_pence(100), "GBP").await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Gateway(GatewayError::Timeout { after_ms: 200, .. })
        ));

        let result = gateway
            .refund(Money::from_pence(100), "pi_1", "GBP")
            .await
            .unwrap();
        assert!(!result.success);
    }
}
