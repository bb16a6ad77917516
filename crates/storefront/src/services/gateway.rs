//! Payment gateway client (Razorpay orders API).
//!
//! Creates gateway orders for checkout and verifies the payment signature
//! the browser widget hands back after a successful payment.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::GatewayConfig;

type HmacSha256 = Hmac<Sha256>;

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered 429 or 5xx.
    #[error("gateway unavailable: {status}")]
    Unavailable { status: u16, message: String },

    /// Gateway rejected the request.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

impl GatewayError {
    /// Timeouts, connection failures, 429 and 5xx are worth another attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Unavailable { .. } => true,
            Self::Api { .. } => false,
        }
    }
}

/// Order creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    /// `1` captures the payment automatically once authorized.
    pub payment_capture: u8,
}

impl CreateOrderRequest {
    /// Auto-captured order with a `rcpt_<unix millis>` receipt.
    #[must_use]
    pub fn new(amount: i64, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
            receipt: format!("rcpt_{}", chrono::Utc::now().timestamp_millis()),
            payment_capture: 1,
        }
    }
}

/// Order as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A payment provider that can open orders and vouch for payments.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an order the customer will pay against.
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<GatewayOrder, GatewayError>;

    /// Check the signature returned with a completed payment.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// HTTP client for the Razorpay REST API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
}

impl RazorpayClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    fn backoff() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(3)
            .with_jitter()
    }

    async fn post_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .client
            .post(format!("{}/v1/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let order: GatewayOrder = response.json().await?;
            debug!(gateway_order_id = %order.id, "Gateway order created");
            return Ok(order);
        }

        let message: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            warn!(status = %status, body = %message, "Gateway returned retryable status");
            Err(GatewayError::Unavailable {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self), fields(amount = request.amount, currency = %request.currency))]
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        (|| async { self.post_order(request).await })
            .retry(Self::backoff())
            .when(GatewayError::is_transient)
            .notify(|err, delay| {
                warn!(error = %err, ?delay, "Retrying gateway order creation");
            })
            .await
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(
            self.key_secret.expose_secret(),
            order_id,
            payment_id,
            signature,
        )
    }
}

/// Check a payment signature: hex HMAC-SHA256 of `"{order_id}|{payment_id}"`
/// keyed with the gateway secret. Compared in constant time.
#[must_use]
pub fn verify_payment_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&expected).is_ok()
}
