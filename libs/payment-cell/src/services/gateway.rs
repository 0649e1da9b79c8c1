// libs/payment-cell/src/services/gateway.rs
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::error::PaymentError;
use crate::models::{CreateOrderRequest, CreateOrderResponse, GatewayOrder};
use crate::services::signature;

/// The slice of the payment gateway this core consumes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError>;

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;

    /// Public key handed to the client checkout.
    fn key_id(&self) -> String;
}

/// Orders API client (Razorpay-compatible).
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &AppConfig) -> Self {
        if !config.is_payment_configured() {
            warn!("Payment gateway credentials missing; order creation will fail");
        }

        Self {
            client: Client::new(),
            base_url: config.payment_gateway_base_url.trim_end_matches('/').to_string(),
            key_id: config.payment_key_id.clone(),
            key_secret: config.payment_key_secret.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    /// POST /v1/orders
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        if self.key_id.is_empty() || self.key_secret.is_empty() {
            return Err(PaymentError::NotConfigured);
        }

        let url = format!("{}/v1/orders", self.base_url);
        debug!("Creating gateway order for receipt {} at {}", receipt, url);

        let request_body = CreateOrderRequest {
            amount: amount_minor,
            currency,
            receipt,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Gateway order creation failed: {} - {}", status, response_text);
            return Err(PaymentError::Gateway(format!("HTTP {}: {}", status, response_text)));
        }

        let order: CreateOrderResponse = serde_json::from_str(&response_text)
            .map_err(|e| PaymentError::Gateway(format!("Failed to parse order response: {}", e)))?;

        info!("Gateway order {} created for receipt {}", order.id, receipt);
        Ok(GatewayOrder {
            order_id: order.id,
            amount_minor: order.amount,
            currency: order.currency,
        })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        signature::verify(&self.key_secret, order_id, payment_id, signature)
    }

    fn key_id(&self) -> String {
        self.key_id.clone()
    }
}
