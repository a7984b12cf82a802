use actix_web::{http::StatusCode, web, web::ServiceConfig};
use campus_eats_engine::{
    db_types::{OrderId, OrderItem, OrderStatusType, PaymentStatus, Role},
    events::EventProducers,
    OrderFlowApi,
};
use ce_common::Paise;

use super::{
    helpers::{get_request, issue_token, sample_order},
    mocks::MockStorage,
};
use crate::routes::{MyOrdersRoute, OrderByIdRoute};

#[actix_web::test]
async fn fetch_my_orders_without_a_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/orders", configure).await.expect_err("Expected error");
    assert_eq!(err, "No access token was provided.");
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Student, None);
    let (status, body) = get_request(&token, "/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""order_id":"ord-1""#), "was: {body}");
    assert!(body.contains(r#""order_id":"ord-2""#), "was: {body}");
    assert!(body.contains(r#""status":"placed""#), "was: {body}");
}

#[actix_web::test]
async fn fetch_my_orders_with_a_tampered_token() {
    let _ = env_logger::try_init().ok();
    let mut token = issue_token("alice", Role::Student, None);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    let err = get_request(&token, "/orders", configure).await.expect_err("Expected error");
    assert_eq!(err, "Access token is invalid.");
}

#[actix_web::test]
async fn riders_cannot_use_the_student_listing() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("dash", Role::Rider, None);
    let err = get_request(&token, "/orders", configure).await.expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions");
}

#[actix_web::test]
async fn order_detail_for_the_owner_includes_items() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Student, None);
    let (status, body) = get_request(&token, "/order/id/ord-1", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""order_id":"ord-1""#), "was: {body}");
    assert!(body.contains(r#""food_item_id":"masala-dosa""#), "was: {body}");
}

#[actix_web::test]
async fn order_detail_is_hidden_from_other_students() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("mallory", Role::Student, None);
    let (status, body) = get_request(&token, "/order/id/ord-1", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not found"), "was: {body}");
}

#[actix_web::test]
async fn order_detail_is_visible_to_the_assigned_rider() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("dash", Role::Rider, None);
    let (status, body) = get_request(&token, "/order/id/ord-3", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""delivery_partner":"dash""#), "was: {body}");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut storage = MockStorage::new();
    storage
        .expect_fetch_orders_for_user()
        .returning(|_| {
            Ok(vec![
                sample_order("ord-1", "alice", OrderStatusType::Placed, PaymentStatus::Pending),
                sample_order("ord-2", "alice", OrderStatusType::Delivered, PaymentStatus::Paid),
            ])
        });
    storage.expect_fetch_order_by_order_id().returning(|id| match id.as_str() {
        "ord-1" => Ok(Some(sample_order("ord-1", "alice", OrderStatusType::Cooking, PaymentStatus::Paid))),
        "ord-3" => {
            let mut order = sample_order("ord-3", "alice", OrderStatusType::OutForDelivery, PaymentStatus::Paid);
            order.delivery_partner = Some("dash".to_string());
            Ok(Some(order))
        },
        _ => Ok(None),
    });
    storage.expect_fetch_order_items().returning(|id| {
        Ok(vec![OrderItem {
            id: 1,
            order_id: OrderId(id.as_str().to_string()),
            food_item_id: "masala-dosa".to_string(),
            vendor_id: "v-dosa".to_string(),
            quantity: 4,
            unit_price: Paise::from(6000),
        }])
    });
    let api = OrderFlowApi::new(storage, EventProducers::default());
    cfg.service(MyOrdersRoute::<MockStorage>::new())
        .service(OrderByIdRoute::<MockStorage>::new())
        .app_data(web::Data::new(api));
}
