use chrono::Duration;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusType},
    traits::PaymentGatewayError,
};

/// Inserts a new order record using the given connection. This is not atomic on its own; callers wrap this and
/// [`insert_order_items`] in a transaction and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    let inserted = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                subtotal,
                delivery_fee,
                total,
                currency,
                provider,
                remote_order_id,
                address_label,
                address_line1,
                address_line2,
                address_landmark
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.user_id)
    .bind(order.subtotal.value())
    .bind(order.delivery_fee.value())
    .bind(order.total.value())
    .bind(&order.currency)
    .bind(&order.provider)
    .bind(&order.remote_order_id)
    .bind(&order.address.label)
    .bind(&order.address.line1)
    .bind(&order.address.line2)
    .bind(&order.address.landmark)
    .fetch_one(conn)
    .await?;
    Ok(inserted)
}

/// Inserts the item lines for the order. Same atomicity caveat as [`insert_order`].
pub async fn insert_order_items(order: &NewOrder, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, food_item_id, vendor_id, quantity, unit_price) VALUES ($1, $2, $3, \
             $4, $5)",
        )
        .bind(order.order_id.as_str())
        .bind(&item.food_item_id)
        .bind(&item.vendor_id)
        .bind(item.quantity)
        .bind(item.unit_price.value())
        .execute(&mut *conn)
        .await?;
    }
    debug!("📝️ Inserted {} item lines for order {}", order.items.len(), order.order_id);
    Ok(())
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Looks an order up by the payment provider's order id. This is the only identifier the webhook path carries.
pub async fn fetch_order_by_remote_id(
    remote_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE remote_order_id = $1")
        .bind(remote_order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn fetch_orders_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Orders with at least one item line from the vendor. Unpaid orders are only shown while they are younger than
/// `failed_grace`; after that they are assumed abandoned and drop off the vendor's board until payment lands.
pub async fn fetch_orders_for_vendor(
    vendor_id: &str,
    failed_grace: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        SELECT DISTINCT orders.*
        FROM orders JOIN order_items ON orders.order_id = order_items.order_id
        WHERE order_items.vendor_id = $1
          AND orders.status != 'cancelled'
          AND (
            orders.payment_status = 'paid'
            OR (unixepoch(CURRENT_TIMESTAMP) - unixepoch(orders.created_at)) < $2
          )
        ORDER BY orders.created_at DESC
        "#,
    )
    .bind(vendor_id)
    .bind(failed_grace.num_seconds())
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Paid, kitchen-ready orders with no rider attached, excluding any this rider has declined. Oldest first.
pub async fn fetch_claimable_orders(rider_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE status = 'ready'
          AND payment_status = 'paid'
          AND delivery_partner IS NULL
          AND order_id NOT IN (SELECT order_id FROM order_declines WHERE rider_id = $1)
        ORDER BY created_at ASC
        "#,
    )
    .bind(rider_id)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn fetch_orders_for_rider(rider_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE delivery_partner = $1 ORDER BY created_at DESC")
        .bind(rider_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Settles the order's payment, conditional on the payment status still being `pending`.
///
/// The conditional write is the idempotency mechanism: the first settlement (client callback or webhook,
/// whichever arrives first) flips the status, any re-delivery matches zero rows. The second element of the result
/// is `true` only for the call that flipped it.
pub async fn mark_order_paid(
    order_id: &OrderId,
    remote_payment_id: &str,
    remote_signature: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentGatewayError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            payment_status = 'paid',
            remote_payment_id = $1,
            remote_signature = COALESCE($2, remote_signature),
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $3 AND payment_status = 'pending'
        RETURNING *
        "#,
    )
    .bind(remote_payment_id)
    .bind(remote_signature)
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(order) => Ok((order, true)),
        None => {
            trace!("📝️ Payment for {order_id} was already settled");
            let order = fetch_order_by_order_id(order_id, conn)
                .await?
                .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
            Ok((order, false))
        },
    }
}

/// Records a failed payment, conditional on the status still being `pending`. Same idempotency contract as
/// [`mark_order_paid`].
pub async fn mark_payment_failed(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentGatewayError> {
    let updated: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payment_status = 'failed', updated_at = CURRENT_TIMESTAMP WHERE order_id = $1 AND \
         payment_status = 'pending' RETURNING *",
    )
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(order) => Ok((order, true)),
        None => {
            let order = fetch_order_by_order_id(order_id, conn)
                .await?
                .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
            Ok((order, false))
        },
    }
}

/// Moves the order from `from` to `to` in a single conditional `UPDATE`. A `None` result means the order was no
/// longer in the `from` status when the write landed.
pub async fn transition_order(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = $3 RETURNING *",
    )
    .bind(to.to_string())
    .bind(order_id.as_str())
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Atomically assigns the order to the rider and moves it out for delivery. The `delivery_partner IS NULL` guard
/// is what guarantees a single winner among concurrent claimants.
pub async fn claim_order(
    order_id: &OrderId,
    rider_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            status = 'out_for_delivery',
            delivery_partner = $1,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $2 AND status = 'ready' AND delivery_partner IS NULL
        RETURNING *
        "#,
    )
    .bind(rider_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Hides the order from this rider's claimable list. Repeat declines are ignored.
pub async fn decline_order(
    order_id: &OrderId,
    rider_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    sqlx::query("INSERT OR IGNORE INTO order_declines (order_id, rider_id) VALUES ($1, $2)")
        .bind(order_id.as_str())
        .bind(rider_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Completes the delivery, conditional on the order being out for delivery and assigned to this exact rider.
pub async fn mark_delivered(
    order_id: &OrderId,
    rider_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = 'delivered', updated_at = CURRENT_TIMESTAMP WHERE order_id = $1 AND status = \
         'out_for_delivery' AND delivery_partner = $2 RETURNING *",
    )
    .bind(order_id.as_str())
    .bind(rider_id)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Cancels orders that have sat in `placed` for longer than the given duration, up to `batch` of them,
/// oldest first. Payment state is irrelevant here; a paid order the vendor never started cooking goes stale the
/// same as an abandoned checkout. The status guard in the subquery and the outer `WHERE` make the sweep safe to
/// run concurrently with vendor acceptances: an order accepted mid-sweep simply stops matching.
pub async fn cancel_stale_orders(
    older_than: Duration,
    batch: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, PaymentGatewayError> {
    let rows = sqlx::query_as(
        r#"
        UPDATE orders SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP
        WHERE status = 'placed' AND order_id IN (
            SELECT order_id FROM orders
            WHERE status = 'placed'
              AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) > $1
            ORDER BY created_at ASC
            LIMIT $2
        )
        RETURNING *
        "#,
    )
    .bind(older_than.num_seconds())
    .bind(batch)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Deletes orders still sitting in `placed`, never paid, and older than the given duration, along with their item
/// lines and decline records. These are abandoned checkouts with no settlement to reconcile, so the rows are
/// removed outright. Orders in any other status, cancelled ones included, are history and are never purged.
pub async fn purge_unpaid_orders(older_than: Duration, conn: &mut SqliteConnection) -> Result<u64, PaymentGatewayError> {
    let secs = older_than.num_seconds();
    sqlx::query(
        "DELETE FROM order_items WHERE order_id IN (SELECT order_id FROM orders WHERE status = 'placed' AND \
         payment_status != 'paid' AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) > $1)",
    )
    .bind(secs)
    .execute(&mut *conn)
    .await?;
    sqlx::query(
        "DELETE FROM order_declines WHERE order_id IN (SELECT order_id FROM orders WHERE status = 'placed' AND \
         payment_status != 'paid' AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) > $1)",
    )
    .bind(secs)
    .execute(&mut *conn)
    .await?;
    let result = sqlx::query(
        "DELETE FROM orders WHERE status = 'placed' AND payment_status != 'paid' AND \
         (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) > $1",
    )
    .bind(secs)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
