use actix_web::{http::StatusCode, web, web::ServiceConfig};
use campus_eats_engine::{
    db_types::{OrderStatusType, PaymentStatus, Role},
    events::EventProducers,
    order_objects::VendorEarnings,
    OrderFlowApi,
};
use ce_common::Paise;
use serde_json::json;

use super::{
    helpers::{get_request, issue_token, patch_request, sample_order},
    mocks::MockStorage,
};
use crate::{
    config::ServerConfig,
    routes::{VendorAdvanceRoute, VendorEarningsRoute, VendorOrdersRoute},
};

#[actix_web::test]
async fn the_kitchen_board_lists_the_vendors_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("dosa-staff", Role::Vendor, Some("v-dosa"));
    let (status, body) = get_request(&token, "/vendor/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""order_id":"ord-1""#), "was: {body}");
}

#[actix_web::test]
async fn the_staff_linkage_resolves_when_the_token_lacks_a_vendor_id() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("dosa-staff", Role::Vendor, None);
    let (status, body) = get_request(&token, "/vendor/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""order_id":"ord-1""#), "was: {body}");
}

#[actix_web::test]
async fn unlinked_staff_accounts_are_refused() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("drifter", Role::Vendor, None);
    let (status, body) = get_request(&token, "/vendor/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("not linked to a vendor"), "was: {body}");
}

#[actix_web::test]
async fn students_cannot_see_the_kitchen_board() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Student, None);
    let err = get_request(&token, "/vendor/orders", configure).await.expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions");
}

#[actix_web::test]
async fn advancing_needs_an_item_in_the_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("wok-staff", Role::Vendor, Some("v-wok"));
    let (status, body) = patch_request(&token, "/vendor/order/ord-1/status", json!({ "status": "cooking" }), configure)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("no items in this order"), "was: {body}");
}

#[actix_web::test]
async fn losing_a_kitchen_race_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("dosa-staff", Role::Vendor, Some("v-dosa"));
    let (status, body) = patch_request(&token, "/vendor/order/ord-1/status", json!({ "status": "cooking" }), configure)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("modified by someone else"), "was: {body}");
}

#[actix_web::test]
async fn unpaid_orders_cannot_be_advanced() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("dosa-staff", Role::Vendor, Some("v-dosa"));
    let (status, body) = patch_request(&token, "/vendor/order/ord-9/status", json!({ "status": "cooking" }), configure)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT, "was: {body}");
}

#[actix_web::test]
async fn delivery_stages_are_off_limits_to_vendors() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("dosa-staff", Role::Vendor, Some("v-dosa"));
    let (status, body) =
        patch_request(&token, "/vendor/order/ord-1/status", json!({ "status": "out_for_delivery" }), configure)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT, "was: {body}");
}

#[actix_web::test]
async fn the_earnings_summary_comes_from_delivered_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("dosa-staff", Role::Vendor, Some("v-dosa"));
    let (status, body) = get_request(&token, "/vendor/earnings", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""delivered_orders":12"#), "was: {body}");
    assert!(body.contains(r#""gross_revenue":144000"#), "was: {body}");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut storage = MockStorage::new();
    storage.expect_resolve_vendor_for_user().returning(|user| match user {
        "dosa-staff" => Ok(Some("v-dosa".to_string())),
        _ => Ok(None),
    });
    storage
        .expect_fetch_orders_for_vendor()
        .withf(|vendor, _| vendor == "v-dosa")
        .returning(|_, _| Ok(vec![sample_order("ord-1", "alice", OrderStatusType::Placed, PaymentStatus::Paid)]));
    storage
        .expect_vendor_has_item_in_order()
        .returning(|_, vendor| Ok(vendor == "v-dosa"));
    storage.expect_fetch_order_by_order_id().returning(|id| match id.as_str() {
        "ord-1" => Ok(Some(sample_order("ord-1", "alice", OrderStatusType::Placed, PaymentStatus::Paid))),
        "ord-9" => Ok(Some(sample_order("ord-9", "alice", OrderStatusType::Placed, PaymentStatus::Pending))),
        _ => Ok(None),
    });
    // zero rows matched: someone else moved the order first
    storage.expect_transition_order().returning(|_, _, _| Ok(None));
    storage.expect_earnings_for_vendor().returning(|vendor| {
        Ok(VendorEarnings {
            vendor_id: vendor.to_string(),
            delivered_orders: 12,
            items_sold: 48,
            gross_revenue: Paise::from(144_000),
        })
    });
    let api = OrderFlowApi::new(storage, EventProducers::default());
    cfg.service(VendorOrdersRoute::<MockStorage>::new())
        .service(VendorAdvanceRoute::<MockStorage>::new())
        .service(VendorEarningsRoute::<MockStorage>::new())
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(ServerConfig::default()));
}
