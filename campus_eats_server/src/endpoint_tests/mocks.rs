use campus_eats_engine::{
    db_types::{FoodItem, NewOrder, Order, OrderId, OrderItem, OrderStatusType},
    order_objects::VendorEarnings,
    traits::{OrderManagement, PaymentGatewayDatabase, PaymentGatewayError},
};
use ce_common::Paise;
use chrono::Duration;
use mockall::mock;

use crate::gateway::{GatewayError, PaymentProvider, RemoteOrder};

mock! {
    pub Storage {}
    impl Clone for Storage {
        fn clone(&self) -> Self;
    }
    impl OrderManagement for Storage {
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_by_remote_id(&self, remote_order_id: &str) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;
        async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn fetch_orders_for_vendor(&self, vendor_id: &str, failed_grace: Duration) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn fetch_claimable_orders(&self, rider_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn fetch_orders_for_rider(&self, rider_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn vendor_ids_for_order(&self, order_id: &OrderId) -> Result<Vec<String>, PaymentGatewayError>;
        async fn vendor_has_item_in_order(&self, order_id: &OrderId, vendor_id: &str) -> Result<bool, PaymentGatewayError>;
        async fn resolve_vendor_for_user(&self, user_id: &str) -> Result<Option<String>, PaymentGatewayError>;
        async fn fetch_food_items(&self, ids: &[String]) -> Result<Vec<FoodItem>, PaymentGatewayError>;
        async fn earnings_for_vendor(&self, vendor_id: &str) -> Result<VendorEarnings, PaymentGatewayError>;
    }
    impl PaymentGatewayDatabase for Storage {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;
        async fn mark_order_paid<'a>(&self, order_id: &OrderId, remote_payment_id: &str, remote_signature: Option<&'a str>) -> Result<(Order, bool), PaymentGatewayError>;
        async fn mark_payment_failed(&self, order_id: &OrderId) -> Result<(Order, bool), PaymentGatewayError>;
        async fn transition_order(&self, order_id: &OrderId, from: OrderStatusType, to: OrderStatusType) -> Result<Option<Order>, PaymentGatewayError>;
        async fn claim_order(&self, order_id: &OrderId, rider_id: &str) -> Result<Option<Order>, PaymentGatewayError>;
        async fn decline_order(&self, order_id: &OrderId, rider_id: &str) -> Result<(), PaymentGatewayError>;
        async fn mark_delivered(&self, order_id: &OrderId, rider_id: &str) -> Result<Option<Order>, PaymentGatewayError>;
        async fn cancel_stale_orders(&self, older_than: Duration, batch: i64) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn purge_unpaid_orders(&self, older_than: Duration) -> Result<u64, PaymentGatewayError>;
        async fn close(&mut self) -> Result<(), PaymentGatewayError>;
    }
}

mock! {
    pub Provider {}
    impl PaymentProvider for Provider {
        async fn create_remote_order(&self, amount: Paise, receipt: &str) -> Result<RemoteOrder, GatewayError>;
        fn key_id(&self) -> &str;
        fn verify_payment_signature(&self, remote_order_id: &str, remote_payment_id: &str, signature: &str) -> bool;
    }
}
