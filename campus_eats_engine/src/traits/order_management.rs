use chrono::Duration;

use crate::{
    db_types::{FoodItem, Order, OrderId, OrderItem},
    order_objects::VendorEarnings,
    traits::PaymentGatewayError,
};

/// Read-side queries over orders and the catalog. These back the role-scoped listing endpoints and the vendor
/// attribution checks performed before mutations.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetches the order with the given public order id, or `None` if it does not exist.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Fetches the order carrying the given payment-provider order id. Used by the webhook path, which only knows
    /// the provider's identifiers.
    async fn fetch_order_by_remote_id(&self, remote_order_id: &str) -> Result<Option<Order>, PaymentGatewayError>;

    /// The item lines of an order, in insertion order.
    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    /// All orders belonging to the given student, newest first.
    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Orders containing at least one item from the given vendor, newest first.
    ///
    /// Unpaid orders are included only while they are younger than `failed_grace`, so a vendor's dashboard shows
    /// fresh orders awaiting payment but not abandoned ones.
    async fn fetch_orders_for_vendor(
        &self,
        vendor_id: &str,
        failed_grace: Duration,
    ) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Paid, `ready` orders with no rider attached, excluding any the given rider has declined. Oldest first, so
    /// long-waiting orders surface at the top of the pickup list.
    async fn fetch_claimable_orders(&self, rider_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Orders currently or previously assigned to the given rider, newest first.
    async fn fetch_orders_for_rider(&self, rider_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;

    /// The distinct vendors with at least one item line in the order.
    async fn vendor_ids_for_order(&self, order_id: &OrderId) -> Result<Vec<String>, PaymentGatewayError>;

    /// Whether the given vendor has at least one item line in the order. Vendors may only act on orders that pass
    /// this check.
    async fn vendor_has_item_in_order(&self, order_id: &OrderId, vendor_id: &str)
        -> Result<bool, PaymentGatewayError>;

    /// Resolves the vendor a signed-in vendor user acts for, via the vendor staff linkage table.
    async fn resolve_vendor_for_user(&self, user_id: &str) -> Result<Option<String>, PaymentGatewayError>;

    /// Catalog rows for the given item ids, in no particular order. Missing ids are simply absent from the result.
    async fn fetch_food_items(&self, ids: &[String]) -> Result<Vec<FoodItem>, PaymentGatewayError>;

    /// Per-item revenue attribution over the vendor's delivered orders.
    async fn earnings_for_vendor(&self, vendor_id: &str) -> Result<VendorEarnings, PaymentGatewayError>;
}
