//! Checkout and payment-settlement handlers.
//!
//! Settlement can arrive on two independent legs: the client callback (the browser relays the provider's signature
//! bundle after checkout) and the provider's server-to-server webhook. Either leg may land first, both may land,
//! and the webhook retries. The engine makes settlement idempotent, so these handlers only authenticate their leg
//! and hand over.
use actix_web::{web, HttpResponse};
use campus_eats_engine::{
    db_types::{NewOrder, OrderId, Role},
    traits::PaymentGatewayDatabase,
    OrderFlowApi,
};
use log::*;
use serde_json::json;

use crate::{
    auth::JwtClaims,
    config::ServerConfig,
    data_objects::{CreateOrderRequest, CreateOrderResponse, VerifyPaymentRequest, WebhookEvent},
    errors::ServerError,
    gateway::{GatewayError, PaymentProvider},
    route,
};

pub const PAYMENT_PROVIDER_NAME: &str = "razorpay";

/// Webhook event names that settle a payment.
const CAPTURED_EVENTS: [&str; 2] = ["payment.captured", "order.paid"];
const FAILED_EVENT: &str = "payment.failed";

route!(checkout => Post "/checkout" impl PaymentGatewayDatabase, PaymentProvider where requires [Role::Student]);
/// Checkout: prices the cart, registers the order with the payment provider, and persists it.
///
/// The provider call happens *before* anything is written, so a provider outage leaves no half-created orders
/// behind; the client simply retries checkout. The response carries everything the client needs to open the
/// provider's payment window.
pub async fn checkout<B, P>(
    claims: JwtClaims,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
    provider: web::Data<P>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    P: PaymentProvider,
{
    let CreateOrderRequest { items, address } = body.into_inner();
    debug!("💻️ Checkout request from {} with {} cart lines", claims.sub, items.len());
    let priced = api.price_cart(&items, &config.fee_policy).await?;
    let order_id = OrderId::random();
    let remote = provider.create_remote_order(priced.total, order_id.as_str()).await.map_err(provider_error)?;
    let new_order = NewOrder {
        order_id: order_id.clone(),
        user_id: claims.sub.clone(),
        address,
        subtotal: priced.subtotal,
        delivery_fee: priced.delivery_fee,
        total: priced.total,
        currency: remote.currency.clone(),
        provider: PAYMENT_PROVIDER_NAME.to_string(),
        remote_order_id: remote.id.clone(),
        items: priced.items,
    };
    let order = api.place_order(new_order).await?;
    let response = CreateOrderResponse {
        order_id: order.order_id,
        remote_order_id: order.remote_order_id,
        amount: order.total,
        currency: order.currency,
        key_id: provider.key_id().to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}

fn provider_error(e: GatewayError) -> ServerError {
    warn!("💻️ Payment provider call failed. {e}");
    ServerError::ProviderUnavailable(e.to_string())
}

route!(verify_payment => Post "/payments/verify" impl PaymentGatewayDatabase, PaymentProvider where requires [Role::Student]);
/// The client-callback leg of settlement.
///
/// The caller must own the order, the remote order id must match the one stored at checkout, and the relayed
/// signature must verify against the provider key secret. Failures return a deliberately generic 400; the detail
/// goes to the log only, so a probing client learns nothing about which check failed.
pub async fn verify_payment<B, P>(
    claims: JwtClaims,
    body: web::Json<VerifyPaymentRequest>,
    api: web::Data<OrderFlowApi<B>>,
    provider: web::Data<P>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    P: PaymentProvider,
{
    let VerifyPaymentRequest { order_id, remote_order_id, remote_payment_id, remote_signature } = body.into_inner();
    debug!("💻️ Payment verification request for {order_id}");
    let order = api
        .db()
        .fetch_order_by_order_id(&order_id)
        .await
        .map_err(|e| {
            debug!("💻️ Could not fetch order. {e}");
            ServerError::BackendError(e.to_string())
        })?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    if order.user_id != claims.sub {
        debug!("💻️ {} tried to verify a payment on someone else's order {order_id}", claims.sub);
        return Err(ServerError::NoRecordFound(format!("Order {order_id}")));
    }
    if order.remote_order_id != remote_order_id {
        warn!(
            "💻️ Remote order id mismatch on {order_id}: stored {}, client sent {remote_order_id}",
            order.remote_order_id
        );
        return Err(ServerError::PaymentVerificationFailed);
    }
    if !provider.verify_payment_signature(&remote_order_id, &remote_payment_id, &remote_signature) {
        warn!("💻️ Invalid payment signature relayed for {order_id}");
        return Err(ServerError::PaymentVerificationFailed);
    }
    let (order, newly_paid) = api.confirm_payment(&order_id, &remote_payment_id, Some(&remote_signature)).await?;
    if !newly_paid {
        debug!("💻️ Payment for {order_id} was already settled; acknowledging anyway");
    }
    Ok(HttpResponse::Ok().json(order))
}

/// The webhook leg of settlement. Registered behind the HMAC middleware, so by the time this handler runs the body
/// signature has been verified; anything here is a legitimate provider notification.
///
/// Always acknowledges with a 200 once the event has been inspected, including for unknown orders and event types
/// we don't act on, so the provider stops retrying.
pub async fn payment_webhook<B: PaymentGatewayDatabase>(
    body: web::Json<WebhookEvent>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let event = body.into_inner();
    let entity = &event.payload.payment.entity;
    info!("💻️ Webhook received: {} for remote order {}", event.event, entity.order_id);
    let order = api.db().fetch_order_by_remote_id(&entity.order_id).await.map_err(|e| {
        debug!("💻️ Could not look up order for webhook. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    let Some(order) = order else {
        warn!("💻️ Webhook for unknown remote order {}. Acknowledging without action.", entity.order_id);
        return Ok(HttpResponse::Ok().json(json!({ "received": true })));
    };
    if CAPTURED_EVENTS.contains(&event.event.as_str()) {
        let (_, newly_paid) = api.confirm_payment(&order.order_id, &entity.id, None).await?;
        if !newly_paid {
            debug!("💻️ Webhook re-delivered for settled order {}; ignored", order.order_id);
        }
    } else if event.event == FAILED_EVENT {
        api.payment_failed(&order.order_id).await?;
    } else {
        debug!("💻️ Ignoring webhook event type {}", event.event);
    }
    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}
