//! `SqliteDatabase` is a concrete implementation of a Campus Eats order-flow backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::SqlitePool;

use super::db::{catalog, new_pool, orders};
use crate::{
    db_types::{FoodItem, NewOrder, Order, OrderId, OrderItem, OrderStatusType},
    order_objects::VendorEarnings,
    traits::{OrderManagement, PaymentGatewayDatabase, PaymentGatewayError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool with the given maximum number of connections and returns the wrapped database.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_remote_id(&self, remote_order_id: &str) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_remote_id(remote_order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_orders_for_vendor(
        &self,
        vendor_id: &str,
        failed_grace: Duration,
    ) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_orders_for_vendor(vendor_id, failed_grace, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_claimable_orders(&self, rider_id: &str) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_claimable_orders(rider_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_orders_for_rider(&self, rider_id: &str) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_orders_for_rider(rider_id, &mut conn).await?;
        Ok(result)
    }

    async fn vendor_ids_for_order(&self, order_id: &OrderId) -> Result<Vec<String>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let ids = catalog::vendor_ids_for_order(order_id, &mut conn).await?;
        Ok(ids)
    }

    async fn vendor_has_item_in_order(
        &self,
        order_id: &OrderId,
        vendor_id: &str,
    ) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = catalog::vendor_has_item_in_order(order_id, vendor_id, &mut conn).await?;
        Ok(result)
    }

    async fn resolve_vendor_for_user(&self, user_id: &str) -> Result<Option<String>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = catalog::resolve_vendor_for_user(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_food_items(&self, ids: &[String]) -> Result<Vec<FoodItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let items = catalog::fetch_food_items(ids, &mut conn).await?;
        Ok(items)
    }

    async fn earnings_for_vendor(&self, vendor_id: &str) -> Result<VendorEarnings, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = catalog::earnings_for_vendor(vendor_id, &mut conn).await?;
        Ok(result)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let inserted = orders::insert_order(&order, &mut tx).await?;
        orders::insert_order_items(&order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} has been saved in the DB with id {}", inserted.order_id, inserted.id);
        Ok(inserted)
    }

    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        remote_payment_id: &str,
        remote_signature: Option<&str>,
    ) -> Result<(Order, bool), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let (order, newly_paid) =
            orders::mark_order_paid(order_id, remote_payment_id, remote_signature, &mut conn).await?;
        if newly_paid {
            debug!("🗃️ Payment for order {order_id} settled");
        }
        Ok((order, newly_paid))
    }

    async fn mark_payment_failed(&self, order_id: &OrderId) -> Result<(Order, bool), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let (order, newly_failed) = orders::mark_payment_failed(order_id, &mut conn).await?;
        if newly_failed {
            debug!("🗃️ Payment for order {order_id} marked as failed");
        }
        Ok((order, newly_failed))
    }

    async fn transition_order(
        &self,
        order_id: &OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::transition_order(order_id, from, to, &mut conn).await?;
        match &result {
            Some(_) => debug!("🗃️ Order {order_id} moved from {from} to {to}"),
            None => debug!("🗃️ Order {order_id} was not in {from}; transition to {to} skipped"),
        }
        Ok(result)
    }

    async fn claim_order(&self, order_id: &OrderId, rider_id: &str) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::claim_order(order_id, rider_id, &mut conn).await?;
        if result.is_some() {
            debug!("🗃️ Order {order_id} claimed by rider {rider_id}");
        }
        Ok(result)
    }

    async fn decline_order(&self, order_id: &OrderId, rider_id: &str) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::decline_order(order_id, rider_id, &mut conn).await
    }

    async fn mark_delivered(&self, order_id: &OrderId, rider_id: &str) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::mark_delivered(order_id, rider_id, &mut conn).await?;
        if result.is_some() {
            info!("🗃️ Order {order_id} delivered by rider {rider_id}");
        }
        Ok(result)
    }

    async fn cancel_stale_orders(&self, older_than: Duration, batch: i64) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let cancelled = orders::cancel_stale_orders(older_than, batch, &mut conn).await?;
        if !cancelled.is_empty() {
            info!("🗃️ Auto-cancelled {} stale orders", cancelled.len());
        }
        Ok(cancelled)
    }

    async fn purge_unpaid_orders(&self, older_than: Duration) -> Result<u64, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let count = orders::purge_unpaid_orders(older_than, &mut tx).await?;
        tx.commit().await?;
        if count > 0 {
            info!("🗃️ Purged {count} abandoned unpaid orders");
        }
        Ok(count)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}
