//! The remote payment-provider adapter.
//!
//! Order creation needs a provider-side order before the client can open the checkout. [`RazorpayProvider`] makes
//! that call over REST (basic auth, amounts in paise). Signature verification for the client callback lives here
//! too; the webhook body signature is handled by the HMAC middleware.
use std::sync::Arc;

use ce_common::Paise;
use log::*;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::{config::GatewayConfig, helpers::verify_hmac_hex};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The payment provider could not be reached: {0}")]
    Unreachable(String),
    #[error("The payment provider rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
}

/// A provider-side order, created before checkout. The client pays against `id`; settlement callbacks reference
/// it as the remote order id.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// The outward-facing seam for the payment provider. Endpoint tests mock this; production uses
/// [`RazorpayProvider`].
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    /// Creates a provider-side order for the given amount. `receipt` is our order id, echoed back in provider
    /// dashboards and webhooks.
    async fn create_remote_order(&self, amount: Paise, receipt: &str) -> Result<RemoteOrder, GatewayError>;

    /// Public key id handed to the client so it can open the provider's checkout.
    fn key_id(&self) -> &str;

    /// Verifies the signature the client relays after checkout: hex HMAC-SHA256 over
    /// `"{remote_order_id}|{remote_payment_id}"`, keyed with the key secret.
    fn verify_payment_signature(&self, remote_order_id: &str, remote_payment_id: &str, signature: &str) -> bool;
}

#[derive(Clone)]
pub struct RazorpayProvider {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl RazorpayProvider {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().build().map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }
}

impl PaymentProvider for RazorpayProvider {
    async fn create_remote_order(&self, amount: Paise, receipt: &str) -> Result<RemoteOrder, GatewayError> {
        let url = self.url("/v1/orders");
        let body = serde_json::json!({
            "amount": amount.value(),
            "currency": ce_common::INR_CURRENCY_CODE,
            "receipt": receipt,
        });
        trace!("🏦️ Creating remote order for {amount} (receipt {receipt})");
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        if response.status().is_success() {
            let order = response.json::<RemoteOrder>().await.map_err(|e| GatewayError::JsonError(e.to_string()))?;
            debug!("🏦️ Remote order {} created for receipt {receipt}", order.id);
            Ok(order)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayError::Unreachable(e.to_string()))?;
            warn!("🏦️ Remote order creation failed with status {status}: {message}");
            Err(GatewayError::Rejected { status, message })
        }
    }

    fn key_id(&self) -> &str {
        &self.config.key_id
    }

    fn verify_payment_signature(&self, remote_order_id: &str, remote_payment_id: &str, signature: &str) -> bool {
        let payload = format!("{remote_order_id}|{remote_payment_id}");
        verify_hmac_hex(self.config.key_secret.reveal(), payload.as_bytes(), signature)
    }
}
