//! Payment gateway client.
//!
//! Thin client for a hosted-checkout payment provider: the storefront creates
//! a checkout session, redirects the buyer to the returned URL, and later
//! receives a signed webhook confirming or failing the payment. The gateway's
//! internals are out of scope; only this contract is relied on.
//!
//! The client is constructed once at startup and injected through
//! [`crate::state::AppState`] rather than living in module-global state.

use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook body signature (hex HMAC-SHA256).
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the payment gateway client.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Transport-level failure talking to the gateway.
    #[error("payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway rejected the request.
    #[error("payment gateway error ({status}): {message}")]
    Gateway {
        /// HTTP status returned by the gateway.
        status: u16,
        /// Gateway-provided error message, when parseable.
        message: String,
    },

    /// A webhook body failed signature verification.
    #[error("webhook signature verification failed")]
    InvalidSignature,

    /// A webhook body could not be parsed.
    #[error("malformed webhook payload: {0}")]
    MalformedWebhook(String),
}

/// Request to open a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    /// Amount to charge, in the gateway's minor unit.
    pub amount_minor: i64,
    /// ISO currency code.
    pub currency: String,
    /// Our order reference, echoed back in the webhook.
    pub order_reference: String,
    /// Where the gateway sends the buyer after payment.
    pub success_url: String,
    /// Where the gateway sends the buyer on cancel.
    pub cancel_url: String,
}

/// A created checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Gateway session id.
    pub id: String,
    /// Hosted checkout URL to redirect the buyer to.
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: Option<GatewayErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    message: Option<String>,
}

/// Payment events delivered by webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// `payment.confirmed` or `payment.failed`.
    pub event: String,
    /// The order reference handed over at session creation.
    pub order_reference: String,
    /// Gateway payment id, present on confirmations.
    pub payment_id: Option<String>,
    /// Charged amount in currency units, as a decimal string.
    pub amount: Option<String>,
}

impl WebhookEvent {
    /// Whether this event confirms a successful payment.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.event == "payment.confirmed"
    }
}

/// Client for the hosted-checkout payment gateway.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    api_base: String,
    api_key: SecretString,
}

impl GatewayClient {
    /// Create a new gateway client.
    ///
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be constructed, which only
    /// happens when the TLS backend fails to initialize at startup.
    #[must_use]
    pub fn new(config: &PaymentConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build payment gateway HTTP client");

        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        }
    }

    /// Create a hosted checkout session and return its redirect URL.
    ///
    /// This is a critical-path call: failures surface to the buyer and the
    /// order stays incomplete.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` on transport failure and
    /// `PaymentError::Gateway` when the gateway rejects the request.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let params = [
            ("mode", "payment".to_owned()),
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.clone()),
            ("client_reference_id", request.order_reference.clone()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<GatewayErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.and_then(|e| e.message))
                .unwrap_or_else(|| "unknown gateway error".to_owned());

            return Err(PaymentError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<CheckoutSession>().await?)
    }
}

/// Verify a webhook body against its signature header and parse the event.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` when the HMAC does not match and
/// `PaymentError::MalformedWebhook` when the body is not a valid event.
pub fn parse_webhook(
    webhook_secret: &SecretString,
    body: &[u8],
    signature_hex: &str,
) -> Result<WebhookEvent, PaymentError> {
    let signature = hex::decode(signature_hex).map_err(|_| PaymentError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(webhook_secret.expose_secret().as_bytes())
        .map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| PaymentError::InvalidSignature)?;

    serde_json::from_slice(body).map_err(|e| PaymentError::MalformedWebhook(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign_body(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_parse_webhook_accepts_valid_signature() {
        let secret = SecretString::from("whsec_test_1234567890");
        let body = br#"{"event":"payment.confirmed","order_reference":"42","payment_id":"pay_9","amount":"15000.00"}"#;
        let sig = sign_body("whsec_test_1234567890", body);

        let event = parse_webhook(&secret, body, &sig).unwrap();
        assert!(event.is_confirmed());
        assert_eq!(event.order_reference, "42");
        assert_eq!(event.payment_id.as_deref(), Some("pay_9"));
        assert_eq!(event.amount.as_deref(), Some("15000.00"));
    }

    #[test]
    fn test_parse_webhook_rejects_bad_signature() {
        let secret = SecretString::from("whsec_test_1234567890");
        let body = br#"{"event":"payment.confirmed","order_reference":"42"}"#;
        let sig = sign_body("a-different-secret", body);

        assert!(matches!(
            parse_webhook(&secret, body, &sig),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_parse_webhook_rejects_tampered_body() {
        let secret = SecretString::from("whsec_test_1234567890");
        let body = br#"{"event":"payment.confirmed","order_reference":"42"}"#;
        let sig = sign_body("whsec_test_1234567890", body);
        let tampered = br#"{"event":"payment.confirmed","order_reference":"43"}"#;

        assert!(matches!(
            parse_webhook(&secret, tampered, &sig),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_parse_webhook_rejects_malformed_body() {
        let secret = SecretString::from("whsec_test_1234567890");
        let body = b"not json at all";
        let sig = sign_body("whsec_test_1234567890", body);

        assert!(matches!(
            parse_webhook(&secret, body, &sig),
            Err(PaymentError::MalformedWebhook(_))
        ));
    }

    #[test]
    fn test_failed_event_is_not_confirmed() {
        let event = WebhookEvent {
            event: "payment.failed".to_owned(),
            order_reference: "42".to_owned(),
            payment_id: None,
            amount: None,
        };
        assert!(!event.is_confirmed());
    }
}
