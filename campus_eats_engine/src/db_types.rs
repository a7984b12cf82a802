//! Database types for the Campus Eats engine.
//!
//! These are the records as they are stored and returned by storage backends. The order record is the single source
//! of truth for the order lifecycle; there is no separate event log. History is reconstructed from the current
//! status and the `created_at`/`updated_at` timestamps only.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use ce_common::Paise;

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh order id. Uniqueness is enforced by the database; the random tag makes collisions
    /// vanishingly unlikely in the first place.
    pub fn random() -> Self {
        let tag: u128 = rand::thread_rng().gen();
        Self(format!("ord-{tag:032x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// The delivery lifecycle stage of an order. The only legal walks are the forward chain
/// `placed → cooking → ready → out_for_delivery → delivered` and the single jump `placed → cancelled`.
/// See [`crate::state`] for the authoritative transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    Placed,
    Cooking,
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::Placed => "placed",
            OrderStatusType::Cooking => "cooking",
            OrderStatusType::Ready => "ready",
            OrderStatusType::OutForDelivery => "out_for_delivery",
            OrderStatusType::Delivered => "delivered",
            OrderStatusType::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(Self::Placed),
            "cooking" => Ok(Self::Cooking),
            "ready" => Ok(Self::Ready),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus      -------------------------------------------------------
/// Payment sub-state of an order. Transitions are one-way: `pending → paid` or `pending → failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------         Role          -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Vendor,
    Rider,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Vendor => write!(f, "vendor"),
            Role::Rider => write!(f, "rider"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "vendor" => Ok(Self::Vendor),
            "rider" => Ok(Self::Rider),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------   DeliveryAddress     -------------------------------------------------------
/// Snapshot of the delivery address chosen at checkout. It is copied onto the order record so that later edits to
/// the student's address book do not retroactively change past orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub label: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
}

//--------------------------------------         Order         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    /// The owning student. Immutable after creation.
    pub user_id: String,
    pub status: OrderStatusType,
    /// The rider who claimed the order, set exactly once by an atomic claim.
    pub delivery_partner: Option<String>,
    pub subtotal: Paise,
    pub delivery_fee: Paise,
    pub total: Paise,
    pub currency: String,
    pub provider: String,
    pub remote_order_id: String,
    pub remote_payment_id: Option<String>,
    pub remote_signature: Option<String>,
    pub payment_status: PaymentStatus,
    pub address_label: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub address_landmark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn delivery_address(&self) -> DeliveryAddress {
        DeliveryAddress {
            label: self.address_label.clone(),
            line1: self.address_line1.clone(),
            line2: self.address_line2.clone(),
            landmark: self.address_landmark.clone(),
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

//--------------------------------------      OrderItem        -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub food_item_id: String,
    /// Vendor attribution, denormalised from the catalog at snapshot time.
    pub vendor_id: String,
    pub quantity: i64,
    /// Catalog price at order-creation time. Never recomputed from the live catalog.
    pub unit_price: Paise,
}

//--------------------------------------       NewOrder        -------------------------------------------------------
/// A fully-priced order ready for insertion, assembled by the order flow from a cart and the catalog snapshot.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: String,
    pub address: DeliveryAddress,
    pub subtotal: Paise,
    pub delivery_fee: Paise,
    pub total: Paise,
    pub currency: String,
    pub provider: String,
    pub remote_order_id: String,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub food_item_id: String,
    pub vendor_id: String,
    pub quantity: i64,
    pub unit_price: Paise,
}

//--------------------------------------      FoodItem         -------------------------------------------------------
/// A catalog row. The catalog is an external collaborator as far as the order flow is concerned; it is consulted
/// exactly once per order, at creation time, to snapshot prices and vendor attribution.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: String,
    pub vendor_id: String,
    pub name: String,
    pub price: Paise,
    pub available: bool,
}
