use serde::{Deserialize, Serialize};

use ce_common::Paise;

use crate::db_types::NewOrderItem;

/// A line in a student's cart, as submitted at checkout. Prices are deliberately absent; they are always taken
/// from the catalog on the server side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub food_item_id: String,
    pub quantity: i64,
}

/// The flat delivery-fee schedule. Small orders carry a slightly higher fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub threshold: Paise,
    pub below_fee: Paise,
    pub at_or_above_fee: Paise,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { threshold: Paise::from_rupees(200), below_fee: Paise::from_rupees(15), at_or_above_fee: Paise::from_rupees(10) }
    }
}

impl FeePolicy {
    pub fn fee_for(&self, subtotal: Paise) -> Paise {
        if subtotal < self.threshold {
            self.below_fee
        } else {
            self.at_or_above_fee
        }
    }
}

/// A cart after pricing against the catalog snapshot: item lines carrying vendor attribution and unit prices, plus
/// the computed totals. This is the payload handed to the payment provider and then persisted as the order.
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub items: Vec<NewOrderItem>,
    pub subtotal: Paise,
    pub delivery_fee: Paise,
    pub total: Paise,
}

/// Aggregated earnings for a vendor over their delivered orders. Revenue is attributed per item line, so an order
/// that spans two vendors counts once for each, with each vendor seeing only their own lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VendorEarnings {
    pub vendor_id: String,
    pub delivered_orders: i64,
    pub items_sold: i64,
    pub gross_revenue: Paise,
}
