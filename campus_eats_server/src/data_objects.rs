use std::fmt::Display;

use campus_eats_engine::{
    db_types::{DeliveryAddress, OrderId, OrderStatusType},
    order_objects::CartItem,
};
use ce_common::Paise;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

/// What a student submits at checkout. Prices are never trusted from the client; the cart is priced against the
/// live catalog on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CartItem>,
    pub address: DeliveryAddress,
}

/// Everything the client needs to open the provider checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: OrderId,
    pub remote_order_id: String,
    pub amount: Paise,
    pub currency: String,
    pub key_id: String,
}

/// The signature bundle the provider's checkout hands to the client, relayed to us for verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: OrderId,
    pub remote_order_id: String,
    pub remote_payment_id: String,
    pub remote_signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
}

/// Joins an existing event-stream connection to an order room. The connection id comes from the first frame of
/// the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub conn_id: u64,
    pub order_id: OrderId,
}

//--------------------------------------   Webhook payloads    -------------------------------------------------------
// The provider's webhook envelope, pared down to the fields we act on.

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub payment: WebhookPaymentWrapper,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPaymentWrapper {
    pub entity: WebhookPaymentEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPaymentEntity {
    /// The provider's payment id (`pay_...`).
    pub id: String,
    /// The provider's order id (`order_...`), used to look up our order.
    pub order_id: String,
}
