use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use campus_eats_engine::{
    db_types::{FoodItem, Order, OrderStatusType, PaymentStatus, Role},
    events::EventProducers,
    OrderFlowApi,
};
use ce_common::{Paise, Secret};
use chrono::{TimeZone, Utc};
use serde_json::json;

use super::{
    helpers::{issue_token, post_request, sample_order, send_raw},
    mocks::{MockProvider, MockStorage},
};
use crate::{
    config::ServerConfig,
    gateway::{GatewayError, RemoteOrder},
    helpers::calculate_hmac_hex,
    middleware::HmacMiddlewareFactory,
    payment_routes::{payment_webhook, CheckoutRoute, VerifyPaymentRoute},
};

const WEBHOOK_SECRET: &str = "hook-secret";

//----------------------------------------------   Checkout  ----------------------------------------------------

#[actix_web::test]
async fn checkout_returns_the_provider_handle() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Student, None);
    let body = json!({
        "items": [{ "food_item_id": "masala-dosa", "quantity": 4 }],
        "address": { "line1": "Hostel 4, Room 112" }
    });
    let (status, body) = post_request(&token, "/checkout", body, configure_checkout(true)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""remote_order_id":"order_new""#), "was: {body}");
    assert!(body.contains(r#""amount":25000"#), "was: {body}");
    assert!(body.contains(r#""key_id":"rzp_test_key""#), "was: {body}");
}

#[actix_web::test]
async fn a_provider_outage_persists_nothing() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Student, None);
    let body = json!({
        "items": [{ "food_item_id": "masala-dosa", "quantity": 4 }],
        "address": { "line1": "Hostel 4, Room 112" }
    });
    // insert_order carries no expectation here; a call would fail the test
    let (status, body) =
        post_request(&token, "/checkout", body, configure_checkout(false)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("payment provider is unavailable"), "was: {body}");
}

#[actix_web::test]
async fn an_empty_cart_is_rejected() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Student, None);
    let body = json!({ "items": [], "address": { "line1": "Hostel 4, Room 112" } });
    let (status, body) =
        post_request(&token, "/checkout", body, configure_checkout(true)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("empty cart"), "was: {body}");
}

fn configure_checkout(provider_up: bool) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut storage = MockStorage::new();
        storage.expect_fetch_food_items().returning(|_| {
            Ok(vec![FoodItem {
                id: "masala-dosa".to_string(),
                vendor_id: "v-dosa".to_string(),
                name: "Masala dosa".to_string(),
                price: Paise::from(6000),
                available: true,
            }])
        });
        if provider_up {
            storage.expect_insert_order().returning(|new| {
                Ok(Order {
                    id: 1,
                    order_id: new.order_id.clone(),
                    user_id: new.user_id.clone(),
                    status: OrderStatusType::Placed,
                    delivery_partner: None,
                    subtotal: new.subtotal,
                    delivery_fee: new.delivery_fee,
                    total: new.total,
                    currency: new.currency.clone(),
                    provider: new.provider.clone(),
                    remote_order_id: new.remote_order_id.clone(),
                    remote_payment_id: None,
                    remote_signature: None,
                    payment_status: PaymentStatus::Pending,
                    address_label: new.address.label.clone(),
                    address_line1: new.address.line1.clone(),
                    address_line2: new.address.line2.clone(),
                    address_landmark: new.address.landmark.clone(),
                    created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
                    updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
                })
            });
        }
        let mut provider = MockProvider::new();
        if provider_up {
            provider
                .expect_create_remote_order()
                .withf(|amount, _| amount.value() == 25_000)
                .returning(|amount, _| {
                    Ok(RemoteOrder { id: "order_new".to_string(), amount: amount.value(), currency: "INR".to_string() })
                });
        } else {
            provider
                .expect_create_remote_order()
                .returning(|_, _| Err(GatewayError::Unreachable("connection refused".to_string())));
        }
        provider.expect_key_id().return_const("rzp_test_key".to_string());
        let api = OrderFlowApi::new(storage, EventProducers::default());
        cfg.service(CheckoutRoute::<MockStorage, MockProvider>::new())
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(provider))
            .app_data(web::Data::new(ServerConfig::default()));
    }
}

//----------------------------------------------   Callback verification  --------------------------------------------

#[actix_web::test]
async fn a_valid_callback_settles_the_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Student, None);
    let body = json!({
        "order_id": "ord-1",
        "remote_order_id": "order_ord-1",
        "remote_payment_id": "pay_123",
        "remote_signature": "good-sig"
    });
    let (status, body) = post_request(&token, "/payments/verify", body, configure_verify).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""payment_status":"paid""#), "was: {body}");
}

#[actix_web::test]
async fn a_bad_signature_gets_a_deliberately_generic_rejection() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Student, None);
    let body = json!({
        "order_id": "ord-1",
        "remote_order_id": "order_ord-1",
        "remote_payment_id": "pay_123",
        "remote_signature": "forged"
    });
    let (status, body) = post_request(&token, "/payments/verify", body, configure_verify).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Payment verification failed"}"#);
}

#[actix_web::test]
async fn a_mismatched_remote_order_id_gets_the_same_generic_rejection() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Student, None);
    let body = json!({
        "order_id": "ord-1",
        "remote_order_id": "order_someone_elses",
        "remote_payment_id": "pay_123",
        "remote_signature": "good-sig"
    });
    let (status, body) = post_request(&token, "/payments/verify", body, configure_verify).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Payment verification failed"}"#);
}

#[actix_web::test]
async fn you_cannot_verify_someone_elses_payment() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("mallory", Role::Student, None);
    let body = json!({
        "order_id": "ord-1",
        "remote_order_id": "order_ord-1",
        "remote_payment_id": "pay_123",
        "remote_signature": "good-sig"
    });
    let (status, body) = post_request(&token, "/payments/verify", body, configure_verify).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND, "was: {body}");
}

fn configure_verify(cfg: &mut ServiceConfig) {
    let mut storage = MockStorage::new();
    storage
        .expect_fetch_order_by_order_id()
        .returning(|_| Ok(Some(sample_order("ord-1", "alice", OrderStatusType::Placed, PaymentStatus::Pending))));
    storage.expect_mark_order_paid().returning(|id, _, _| {
        let mut order = sample_order(id.as_str(), "alice", OrderStatusType::Placed, PaymentStatus::Paid);
        order.remote_payment_id = Some("pay_123".to_string());
        Ok((order, true))
    });
    storage.expect_vendor_ids_for_order().returning(|_| Ok(vec!["v-dosa".to_string()]));
    let mut provider = MockProvider::new();
    provider.expect_verify_payment_signature().returning(|_, _, sig| sig == "good-sig");
    let api = OrderFlowApi::new(storage, EventProducers::default());
    cfg.service(VerifyPaymentRoute::<MockStorage, MockProvider>::new())
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(provider));
}

//----------------------------------------------   Webhook  ----------------------------------------------------

fn webhook_request(body: &str, signature: Option<&str>) -> TestRequest {
    let mut req = TestRequest::post()
        .uri("/webhook/payments")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    if let Some(sig) = signature {
        req = req.insert_header(("X-Razorpay-Signature", sig.to_string()));
    }
    req
}

#[actix_web::test]
async fn webhooks_without_a_signature_are_rejected() {
    let _ = env_logger::try_init().ok();
    let body = captured_event("order_ord-1");
    let err = send_raw(webhook_request(&body, None), configure_webhook).await.expect_err("Expected error");
    assert_eq!(err, "Missing signature.");
}

#[actix_web::test]
async fn forged_webhook_signatures_are_rejected() {
    let _ = env_logger::try_init().ok();
    let body = captured_event("order_ord-1");
    let err = send_raw(webhook_request(&body, Some("deadbeef")), configure_webhook).await.expect_err("Expected error");
    assert_eq!(err, "Invalid signature.");
}

#[actix_web::test]
async fn a_captured_payment_webhook_settles_the_order() {
    let _ = env_logger::try_init().ok();
    let body = captured_event("order_ord-1");
    let sig = calculate_hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, body) =
        send_raw(webhook_request(&body, Some(&sig)), configure_webhook).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn a_failed_payment_webhook_records_the_failure() {
    let _ = env_logger::try_init().ok();
    let body = json!({
        "event": "payment.failed",
        "payload": { "payment": { "entity": { "id": "pay_123", "order_id": "order_ord-1" } } }
    })
    .to_string();
    let sig = calculate_hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, body) =
        send_raw(webhook_request(&body, Some(&sig)), configure_webhook).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn webhooks_for_unknown_orders_are_acknowledged_without_action() {
    let _ = env_logger::try_init().ok();
    let body = captured_event("order_mystery");
    let sig = calculate_hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    // no settlement expectations are configured for this order; a write would fail the test
    let (status, body) =
        send_raw(webhook_request(&body, Some(&sig)), configure_webhook).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

fn captured_event(remote_order_id: &str) -> String {
    json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": { "id": "pay_123", "order_id": remote_order_id } } }
    })
    .to_string()
}

fn configure_webhook(cfg: &mut ServiceConfig) {
    let mut storage = MockStorage::new();
    storage.expect_fetch_order_by_remote_id().returning(|remote| match remote {
        "order_ord-1" => Ok(Some(sample_order("ord-1", "alice", OrderStatusType::Placed, PaymentStatus::Pending))),
        _ => Ok(None),
    });
    storage
        .expect_mark_order_paid()
        .returning(|id, _, _| Ok((sample_order(id.as_str(), "alice", OrderStatusType::Placed, PaymentStatus::Paid), true)));
    storage
        .expect_mark_payment_failed()
        .returning(|id| Ok((sample_order(id.as_str(), "alice", OrderStatusType::Placed, PaymentStatus::Failed), true)));
    storage.expect_vendor_ids_for_order().returning(|_| Ok(vec!["v-dosa".to_string()]));
    let api = OrderFlowApi::new(storage, EventProducers::default());
    cfg.app_data(web::Data::new(api)).service(
        web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new("X-Razorpay-Signature", Secret::new(WEBHOOK_SECRET.to_string())))
            .route("/payments", web::post().to(payment_webhook::<MockStorage>)),
    );
}
