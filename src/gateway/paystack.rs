//! Paystack REST client and webhook signature check.
//!
//! Amounts cross the wire in minor units (kobo for NGN).

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use sha2::Sha512;

use crate::error::ApiError;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Paystack response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

/// Body of `POST /transaction/initialize`.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest {
    /// Payer email.
    pub email: String,
    /// Amount in minor units.
    pub amount: i64,
    /// Our payment reference.
    pub reference: String,
    /// ISO currency code.
    pub currency: String,
    /// Redirect after checkout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    /// Correlation data echoed back in webhooks.
    pub metadata: serde_json::Value,
}

/// Result of a successful initialization.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeData {
    /// Hosted checkout URL.
    pub authorization_url: String,
    /// Checkout access code.
    pub access_code: String,
    /// Reference as registered by the gateway.
    pub reference: String,
}

/// Transaction as reported by `verify` and by webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionData {
    /// Our payment reference.
    pub reference: String,
    /// Gateway status (`success`, `failed`, `abandoned`, ...).
    pub status: String,
    /// Amount in minor units.
    #[serde(default)]
    pub amount: i64,
    /// Currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// Gateway message.
    #[serde(default)]
    pub gateway_response: Option<String>,
    /// Settlement time.
    #[serde(default)]
    pub paid_at: Option<String>,
    /// Channel used (`card`, `bank`, ...).
    #[serde(default)]
    pub channel: Option<String>,
}

impl TransactionData {
    /// Returns `true` when the gateway reports a successful charge.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// Webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event name, e.g. `charge.success`.
    pub event: String,
    /// Transaction payload.
    pub data: TransactionData,
}

/// Paystack API client.
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl std::fmt::Debug for PaystackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PaystackClient {
    /// Creates a client for `base_url` authenticated with `secret_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] if the key is not a valid header value
    /// or the HTTP client cannot be built.
    pub fn new(secret_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {secret_key}"))
            .map_err(|_| ApiError::Internal("invalid Paystack secret key".to_string()))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    /// Secret used to sign webhooks.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Starts a hosted checkout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PaymentGateway`] on transport failure or a
    /// negative gateway answer.
    pub async fn initialize(&self, request: &InitializeRequest) -> Result<InitializeData, ApiError> {
        let url = format!("{}/transaction/initialize", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::PaymentGateway(e.to_string()))?;
        Self::unwrap_envelope(resp).await
    }

    /// Fetches the gateway's view of a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PaymentGateway`] on transport failure or a
    /// negative gateway answer.
    pub async fn verify(&self, reference: &str) -> Result<TransactionData, ApiError> {
        let url = format!("{}/transaction/verify/{reference}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::PaymentGateway(e.to_string()))?;
        Self::unwrap_envelope(resp).await
    }

    async fn unwrap_envelope<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = resp.status();
        let envelope: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| ApiError::PaymentGateway(format!("unreadable response ({status}): {e}")))?;
        match envelope.data {
            Some(data) if envelope.status && status.is_success() => Ok(data),
            _ => Err(ApiError::PaymentGateway(envelope.message)),
        }
    }
}

/// Converts a major-unit amount to minor units (x100, rounded).
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] for negative or overflowing amounts.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ApiError> {
    if amount.is_sign_negative() {
        return Err(ApiError::InvalidRequest("amount cannot be negative".to_string()));
    }
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.round().to_i64())
        .ok_or_else(|| ApiError::InvalidRequest("amount out of range".to_string()))
}

/// Checks `signature` (hex HMAC-SHA512 of `body` keyed with the secret key).
///
/// # Errors
///
/// Returns [`ApiError::InvalidSignature`] when the signature is not hex or
/// does not match.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), ApiError> {
    let expected = hex::decode(signature.trim()).map_err(|_| ApiError::InvalidSignature)?;
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| ApiError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ApiError::InvalidSignature)
}

/// Computes the hex signature Paystack would send for `body`.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] if the MAC cannot be keyed.
pub fn sign_webhook_body(secret: &str, body: &[u8]) -> Result<String, ApiError> {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).map_err(|e| ApiError::Internal(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trip() {
        let body = br#"{"event":"charge.success"}"#;
        let Ok(sig) = sign_webhook_body("sk_test", body) else {
            panic!("sign failed");
        };
        assert!(verify_webhook_signature("sk_test", body, &sig).is_ok());
        assert!(matches!(
            verify_webhook_signature("sk_other", body, &sig),
            Err(ApiError::InvalidSignature)
        ));
        assert!(verify_webhook_signature("sk_test", b"{}", &sig).is_err());
        assert!(verify_webhook_signature("sk_test", body, "not-hex").is_err());
    }

    #[test]
    fn minor_units_round_to_kobo() {
        assert_eq!(to_minor_units(Decimal::new(150_055, 2)).ok(), Some(150_055));
        assert_eq!(to_minor_units(Decimal::from(15_000)).ok(), Some(1_500_000));
        assert!(to_minor_units(Decimal::from(-1)).is_err());
    }

    #[test]
    fn webhook_body_parses() {
        let body = r#"{"event":"charge.success","data":{"reference":"ALU-1","status":"success","amount":1500000,"gateway_response":"Approved"}}"#;
        let Ok(event) = serde_json::from_str::<WebhookEvent>(body) else {
            panic!("parse failed");
        };
        assert!(event.data.is_success());
        assert_eq!(event.data.amount, 1_500_000);
    }

    #[test]
    fn debug_hides_secret() {
        let Ok(client) = PaystackClient::new("sk_live_x", "https://api.paystack.co/", Duration::from_secs(5)) else {
            panic!("client build failed");
        };
        assert!(!format!("{client:?}").contains("sk_live_x"));
    }
}
