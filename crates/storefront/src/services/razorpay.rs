//! Razorpay Orders API client and payment signature checks.
//!
//! Online checkout is two-step: the server creates a gateway order for the
//! exact amount, the browser widget collects payment against it, and the
//! server then verifies the signature the widget hands back.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use kharnak_core::Price;

use super::signing::{constant_time_compare, hmac_sha256};
use crate::config::RazorpayConfig;

/// Razorpay API base URL.
const BASE_URL: &str = "https://api.razorpay.com/v1";

/// Errors that can occur when interacting with Razorpay.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Online payments are not configured on this deployment.
    #[error("online payments are not configured")]
    NotConfigured,

    /// Amount cannot be charged (negative or out of range).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The signature returned by the checkout widget does not match.
    #[error("payment signature mismatch")]
    SignatureMismatch,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A gateway order, as returned by Razorpay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor units (paise for INR).
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// What the browser widget needs to open checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    /// Public key id for the widget.
    pub key_id: String,
    pub order: GatewayOrder,
}

/// Fields the widget posts back after a successful payment.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    #[serde(rename = "razorpayOrderId", alias = "razorpay_order_id")]
    pub order_id: String,
    #[serde(rename = "razorpayPaymentId", alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(rename = "razorpaySignature", alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    key_id: String,
    key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &RazorpayConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    /// Public key id handed to the checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a gateway order for `price`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` for a negative or zero amount,
    /// and `PaymentError::Api`/`Http`/`Parse` if the gateway call fails.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        price: &Price,
        receipt: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let amount = price
            .to_minor_units()
            .filter(|minor| *minor > 0)
            .ok_or_else(|| PaymentError::InvalidAmount(price.amount.to_string()))?;

        let body = CreateOrderRequest {
            amount,
            currency: price.currency_code.code(),
            receipt,
        };

        let response = self
            .client
            .post(format!("{BASE_URL}/orders"))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "razorpay order creation failed");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        tracing::info!(gateway_order_id = %order.id, amount, "razorpay order created");

        Ok(CheckoutSession {
            key_id: self.key_id.clone(),
            order,
        })
    }

    /// Verify the signature the widget returned for a payment.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::SignatureMismatch` if the signature is not
    /// `hex(HMAC-SHA256(order_id "|" payment_id, key_secret))`.
    pub fn verify(&self, confirmation: &PaymentConfirmation) -> Result<(), PaymentError> {
        verify_payment_signature(
            &confirmation.order_id,
            &confirmation.payment_id,
            &confirmation.signature,
            &self.key_secret,
        )
    }
}

/// Check a Razorpay payment signature.
///
/// # Errors
///
/// Returns `PaymentError::SignatureMismatch` if the signature does not match.
pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    key_secret: &SecretString,
) -> Result<(), PaymentError> {
    let message = format!("{order_id}|{payment_id}");
    let expected = hex::encode(hmac_sha256(
        key_secret.expose_secret().as_bytes(),
        message.as_bytes(),
    ));

    if constant_time_compare(&expected, &signature.trim().to_ascii_lowercase()) {
        Ok(())
    } else {
        Err(PaymentError::SignatureMismatch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("rzp_test_secret_value".to_string())
    }

    fn sign(order_id: &str, payment_id: &str) -> String {
        hex::encode(hmac_sha256(
            b"rzp_test_secret_value",
            format!("{order_id}|{payment_id}").as_bytes(),
        ))
    }

    #[test]
    fn test_verify_payment_signature() {
        let signature = sign("order_Kh1", "pay_Kh9");
        assert!(verify_payment_signature("order_Kh1", "pay_Kh9", &signature, &secret()).is_ok());
    }

    #[test]
    fn test_verify_rejects_swapped_ids() {
        let signature = sign("order_Kh1", "pay_Kh9");
        let err =
            verify_payment_signature("order_Kh2", "pay_Kh9", &signature, &secret()).unwrap_err();
        assert!(matches!(err, PaymentError::SignatureMismatch));
    }

    #[test]
    fn test_confirmation_accepts_widget_field_names() {
        let confirmation: PaymentConfirmation = serde_json::from_str(
            r#"{"razorpay_order_id":"order_1","razorpay_payment_id":"pay_1","razorpay_signature":"ab"}"#,
        )
        .unwrap();
        assert_eq!(confirmation.order_id, "order_1");

        let confirmation: PaymentConfirmation = serde_json::from_str(
            r#"{"razorpayOrderId":"order_2","razorpayPaymentId":"pay_2","razorpaySignature":"cd"}"#,
        )
        .unwrap();
        assert_eq!(confirmation.payment_id, "pay_2");
    }
}
