use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// Fired when an order's payment has been confirmed (by the client callback or the provider webhook, whichever
/// lands first). Only the path that actually flipped the payment status fires this event, so webhook re-delivery
/// does not produce duplicate notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    /// Vendors with at least one item in the order. Empty when attribution could not be resolved; consumers fall
    /// back to a global broadcast and log the gap.
    pub vendor_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order: Order,
    pub vendor_ids: Vec<String>,
}

/// Fired on every successful delivery-stage transition, including reconciliation cancellations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub vendor_ids: Vec<String>,
}

/// Fired when a rider wins the claim on an order. Consumers refresh other riders' listings and advance the owning
/// student's tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderClaimedEvent {
    pub order: Order,
    pub vendor_ids: Vec<String>,
}

/// Fired after the faulty-order cleanup job removes abandoned, never-paid orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdersPurgedEvent {
    pub count: u64,
}
