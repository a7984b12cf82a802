use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use campus_eats_engine::{
    events::{
        EventHandlers,
        EventHooks,
        EventProducers,
        OrderClaimedEvent,
        OrderPaidEvent,
        OrderStatusChangedEvent,
        OrdersPurgedEvent,
        PaymentFailedEvent,
    },
    OrderFlowApi,
    SqliteDatabase,
};
use log::*;
use serde_json::json;

use crate::{
    auth::TokenIssuer,
    broadcaster::{Broadcaster, Room},
    config::ServerConfig,
    errors::ServerError,
    gateway::RazorpayProvider,
    middleware::HmacMiddlewareFactory,
    payment_routes::{payment_webhook, CheckoutRoute, VerifyPaymentRoute},
    routes::{
        health,
        ClaimOrderRoute,
        ClaimableOrdersRoute,
        DeclineOrderRoute,
        EventStreamRoute,
        MarkDeliveredRoute,
        MyDeliveriesRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        SubscribeToOrderRoute,
        VendorAdvanceRoute,
        VendorEarningsRoute,
        VendorOrdersRoute,
    },
    workers::{start_purge_worker, start_stale_order_worker},
};

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let broadcaster = Broadcaster::new();
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, broadcast_hooks(broadcaster.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    start_stale_order_worker(db.clone(), producers.clone(), config.auto_cancel_after, config.sweep_batch);
    start_purge_worker(db.clone(), producers.clone(), config.purge_unpaid_after);
    let srv = create_server_instance(config, db, producers, broadcaster)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    broadcaster: Broadcaster,
) -> Result<Server, ServerError> {
    let provider =
        RazorpayProvider::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let jwt_signer = TokenIssuer::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ce::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(config.auth.clone()))
            .app_data(web::Data::new(jwt_signer))
            .app_data(web::Data::new(provider.clone()))
            .app_data(web::Data::new(broadcaster.clone()))
            .app_data(web::Data::new(config.clone()));
        // Routes that require authentication
        let api_scope = web::scope("/api")
            .service(CheckoutRoute::<SqliteDatabase, RazorpayProvider>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, RazorpayProvider>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(VendorOrdersRoute::<SqliteDatabase>::new())
            .service(VendorAdvanceRoute::<SqliteDatabase>::new())
            .service(VendorEarningsRoute::<SqliteDatabase>::new())
            .service(ClaimableOrdersRoute::<SqliteDatabase>::new())
            .service(MyDeliveriesRoute::<SqliteDatabase>::new())
            .service(ClaimOrderRoute::<SqliteDatabase>::new())
            .service(DeclineOrderRoute::<SqliteDatabase>::new())
            .service(MarkDeliveredRoute::<SqliteDatabase>::new())
            .service(EventStreamRoute::<SqliteDatabase>::new())
            .service(SubscribeToOrderRoute::<SqliteDatabase>::new());
        // The webhook is unauthenticated; the body signature is the credential
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new("X-Razorpay-Signature", config.gateway.webhook_secret.clone()))
            .route("/payments", web::post().to(payment_webhook::<SqliteDatabase>));
        app.service(health).service(api_scope).service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Wires the engine's event hooks to the live-event rooms.
///
/// The room fan-out per event:
/// * paid: the owner's room gets `order_paid`; each attributed vendor gets `new_order`. When attribution is empty
///   the gap is logged and a global `orders_updated` nudge goes out instead, so no kitchen misses a paid order.
/// * failed: the owner's room gets `order_payment_failed`; vendors get an `orders_updated` nudge.
/// * status change: the owner's room and the order's room get `order_status`; vendors get `orders_updated`.
/// * claim: a global `order_claimed` so every rider's feed drops the order. The status fan-out above covers the
///   owner's tracker.
/// * purge: a global `orders_updated`.
pub fn broadcast_hooks(broadcaster: Broadcaster) -> EventHooks {
    let mut hooks = EventHooks::default();
    let b = broadcaster.clone();
    hooks.on_order_paid(move |ev: OrderPaidEvent| {
        let b = b.clone();
        Box::pin(async move {
            let order_id = ev.order.order_id.as_str();
            b.publish(&Room::User(ev.order.user_id.clone()), "order_paid", json!({ "order_id": order_id }));
            if ev.vendor_ids.is_empty() {
                warn!("📡️ No vendor attribution for {}. Falling back to a global nudge.", ev.order.order_id);
                b.publish(&Room::Global, "orders_updated", json!({}));
            } else {
                for vendor_id in &ev.vendor_ids {
                    b.publish(&Room::Vendor(vendor_id.clone()), "new_order", json!({ "order_id": order_id }));
                }
            }
        })
    });
    let b = broadcaster.clone();
    hooks.on_payment_failed(move |ev: PaymentFailedEvent| {
        let b = b.clone();
        Box::pin(async move {
            let order_id = ev.order.order_id.as_str();
            b.publish(&Room::User(ev.order.user_id.clone()), "order_payment_failed", json!({
                "order_id": order_id
            }));
            for vendor_id in &ev.vendor_ids {
                b.publish(&Room::Vendor(vendor_id.clone()), "orders_updated", json!({}));
            }
        })
    });
    let b = broadcaster.clone();
    hooks.on_order_status_changed(move |ev: OrderStatusChangedEvent| {
        let b = b.clone();
        Box::pin(async move {
            let order_id = ev.order.order_id.as_str();
            let payload = json!({ "order_id": order_id, "status": ev.order.status });
            b.publish(&Room::User(ev.order.user_id.clone()), "order_status", payload.clone());
            b.publish(&Room::Order(order_id.to_string()), "order_status", payload);
            for vendor_id in &ev.vendor_ids {
                b.publish(&Room::Vendor(vendor_id.clone()), "orders_updated", json!({}));
            }
        })
    });
    let b = broadcaster.clone();
    hooks.on_order_claimed(move |ev: OrderClaimedEvent| {
        let b = b.clone();
        Box::pin(async move {
            b.publish(&Room::Global, "order_claimed", json!({ "order_id": ev.order.order_id.as_str() }));
        })
    });
    let b = broadcaster;
    hooks.on_orders_purged(move |ev: OrdersPurgedEvent| {
        let b = b.clone();
        Box::pin(async move {
            debug!("📡️ {} orders purged; nudging listeners", ev.count);
            b.publish(&Room::Global, "orders_updated", json!({}));
        })
    });
    hooks
}
