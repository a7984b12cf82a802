use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    state::TransitionError,
    traits::OrderManagement,
};

/// The highest level of behaviour a storage backend must expose to support the order flow.
///
/// This behaviour includes:
/// * Atomically storing new orders and their item lines.
/// * Settling payments, both from the client callback and the provider webhook, idempotently.
/// * Moving orders through the delivery lifecycle under optimistic concurrency.
/// * The reconciliation sweeps: auto-cancelling stale orders and purging abandoned ones.
///
/// Every mutation that depends on the current status is implemented as a single conditional `UPDATE`. A call that
/// loses a race matches zero rows; the backend reports that as `None` (for transitions and claims) or `false` (for
/// payment settlement) and never retries on the caller's behalf.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Takes a fully-priced new order and, in a single atomic transaction, stores the order record and all of its
    /// item lines. Either everything lands or nothing does.
    ///
    /// Returns the stored order record.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    /// Marks the order as paid and records the provider's payment id and signature.
    ///
    /// The write is conditional on the payment status still being `pending`, which is what makes webhook
    /// re-delivery safe: the first settlement flips the status, every later one matches zero rows.
    ///
    /// Returns the order and a flag that is `true` only for the call that actually flipped the status. Callers
    /// fire payment events only when the flag is set.
    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        remote_payment_id: &str,
        remote_signature: Option<&str>,
    ) -> Result<(Order, bool), PaymentGatewayError>;

    /// Marks the order's payment as failed, conditional on it still being `pending`. Same idempotency contract as
    /// [`mark_order_paid`](Self::mark_order_paid).
    async fn mark_payment_failed(&self, order_id: &OrderId) -> Result<(Order, bool), PaymentGatewayError>;

    /// Moves the order from `from` to `to` with a single conditional `UPDATE ... WHERE status = from`.
    ///
    /// Returns the updated order, or `None` if the order was no longer in the `from` status (a concurrent actor
    /// got there first). Legality of the transition itself must be checked by the caller beforehand.
    async fn transition_order(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// Atomically assigns the order to the given rider and moves it to `out_for_delivery`.
    ///
    /// The claim succeeds only while the order is `ready` and unassigned, so exactly one of any number of
    /// concurrent claimants wins. Losers get `None`.
    async fn claim_order(&self, order_id: &OrderId, rider_id: &str) -> Result<Option<Order>, PaymentGatewayError>;

    /// Records that the rider declined the order, removing it from their claimable list. Declines are per-rider;
    /// the order stays claimable by everyone else. Repeat declines are a no-op.
    async fn decline_order(&self, order_id: &OrderId, rider_id: &str) -> Result<(), PaymentGatewayError>;

    /// Moves the order to `delivered`, conditional on it being `out_for_delivery` and assigned to this exact
    /// rider. Returns `None` if either condition fails.
    async fn mark_delivered(&self, order_id: &OrderId, rider_id: &str) -> Result<Option<Order>, PaymentGatewayError>;

    /// Cancels orders stuck in `placed` for longer than `older_than`, paid or not, up to `batch` of them, oldest
    /// first.
    ///
    /// The sweep never touches paid orders. Returns the orders that were cancelled, so the caller can notify
    /// their owners.
    async fn cancel_stale_orders(&self, older_than: Duration, batch: i64) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Deletes never-paid orders (and their item lines) older than `older_than` outright. These are abandoned
    /// checkouts with no settlement to reconcile. Returns the number of orders removed.
    async fn purge_unpaid_orders(&self, older_than: Duration) -> Result<u64, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine issue (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot create an order from an empty cart")]
    EmptyCart,
    #[error("Unknown food item: {0}")]
    UnknownFoodItem(String),
    #[error("Food item {0} is not available right now")]
    ItemUnavailable(String),
    #[error("Quantity for food item {0} must be positive")]
    InvalidQuantity(String),
    #[error("This delivery is assigned to another rider")]
    NotYourDelivery,
    #[error("{0}")]
    Conflict(#[from] TransitionError),
    #[error("The order was modified by someone else; nothing was changed")]
    RaceLost,
    #[error("The vendor has no items in this order")]
    VendorNotInOrder,
    #[error("No vendor is linked to this user")]
    NoVendorForUser,
    #[error("Order {0} does not belong to this payment")]
    OrderMismatch(OrderId),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
