use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use campus_eats_engine::db_types::{Order, OrderId, OrderStatusType, PaymentStatus, Role};
use ce_common::{Paise, Secret};
use chrono::{TimeZone, Utc};
use log::debug;

use crate::{auth::TokenIssuer, config::AuthConfig};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new("endpoint-test-secret-0123456789abcdef".to_string()) }
}

pub fn issue_token(sub: &str, role: Role, vendor_id: Option<&str>) -> String {
    let issuer = TokenIssuer::new(&get_auth_config());
    issuer.issue_token(sub, role, vendor_id.map(String::from), None).expect("Failed to sign token")
}

pub async fn get_request<F: FnOnce(&mut ServiceConfig)>(
    token: &str,
    path: &str,
    configure: F,
) -> Result<(StatusCode, String), String> {
    let req = TestRequest::get().uri(path);
    send(req, token, configure).await
}

pub async fn post_request<F: FnOnce(&mut ServiceConfig)>(
    token: &str,
    path: &str,
    body: serde_json::Value,
    configure: F,
) -> Result<(StatusCode, String), String> {
    let req = TestRequest::post().uri(path).set_json(body);
    send(req, token, configure).await
}

pub async fn patch_request<F: FnOnce(&mut ServiceConfig)>(
    token: &str,
    path: &str,
    body: serde_json::Value,
    configure: F,
) -> Result<(StatusCode, String), String> {
    let req = TestRequest::patch().uri(path).set_json(body);
    send(req, token, configure).await
}

pub async fn send_raw<F: FnOnce(&mut ServiceConfig)>(
    req: TestRequest,
    configure: F,
) -> Result<(StatusCode, String), String> {
    send(req, "", configure).await
}

async fn send<F: FnOnce(&mut ServiceConfig)>(
    mut req: TestRequest,
    token: &str,
    configure: F,
) -> Result<(StatusCode, String), String> {
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    let req = req.to_request();
    let app = App::new().app_data(web::Data::new(get_auth_config())).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

/// A fixed order record for mock responses. `remote_order_id` is derived as `order_{id}`.
pub fn sample_order(id: &str, user_id: &str, status: OrderStatusType, payment_status: PaymentStatus) -> Order {
    Order {
        id: 1,
        order_id: OrderId(id.to_string()),
        user_id: user_id.to_string(),
        status,
        delivery_partner: None,
        subtotal: Paise::from(24_000),
        delivery_fee: Paise::from(1000),
        total: Paise::from(25_000),
        currency: "INR".to_string(),
        provider: "razorpay".to_string(),
        remote_order_id: format!("order_{id}"),
        remote_payment_id: None,
        remote_signature: None,
        payment_status,
        address_label: Some("Hostel".to_string()),
        address_line1: "Hostel 4, Room 112".to_string(),
        address_line2: None,
        address_landmark: Some("Near the gym".to_string()),
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    }
}
