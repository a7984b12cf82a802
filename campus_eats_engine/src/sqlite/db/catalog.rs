use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{FoodItem, OrderId},
    order_objects::VendorEarnings,
    traits::PaymentGatewayError,
};

/// Fetches the catalog rows for the given item ids. Ids with no catalog row are silently absent from the result;
/// the order flow treats an absent row as an unknown item.
pub async fn fetch_food_items(ids: &[String], conn: &mut SqliteConnection) -> Result<Vec<FoodItem>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM food_items WHERE id IN (");
    let mut values = builder.separated(", ");
    for id in ids {
        values.push_bind(id);
    }
    builder.push(")");
    let items = builder.build_query_as::<FoodItem>().fetch_all(conn).await?;
    Ok(items)
}

pub async fn vendor_ids_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let ids: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT vendor_id FROM order_items WHERE order_id = $1 ORDER BY vendor_id")
            .bind(order_id.as_str())
            .fetch_all(conn)
            .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

pub async fn vendor_has_item_in_order(
    order_id: &OrderId,
    vendor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM order_items WHERE order_id = $1 AND vendor_id = $2 LIMIT 1")
            .bind(order_id.as_str())
            .bind(vendor_id)
            .fetch_optional(conn)
            .await?;
    Ok(row.is_some())
}

/// Resolves which vendor a signed-in vendor user acts for, via the staff linkage table.
pub async fn resolve_vendor_for_user(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT vendor_id FROM vendor_users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|(vendor_id,)| vendor_id))
}

/// Per-item revenue attribution over the vendor's delivered orders. Only this vendor's item lines contribute to
/// the totals; delivery fees and other vendors' lines in shared orders do not.
pub async fn earnings_for_vendor(
    vendor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<VendorEarnings, PaymentGatewayError> {
    let row: Option<VendorEarnings> = sqlx::query_as(
        r#"
        SELECT
            order_items.vendor_id AS vendor_id,
            COUNT(DISTINCT orders.order_id) AS delivered_orders,
            COALESCE(SUM(order_items.quantity), 0) AS items_sold,
            COALESCE(SUM(order_items.quantity * order_items.unit_price), 0) AS gross_revenue
        FROM order_items JOIN orders ON orders.order_id = order_items.order_id
        WHERE order_items.vendor_id = $1 AND orders.status = 'delivered'
        GROUP BY order_items.vendor_id
        "#,
    )
    .bind(vendor_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.unwrap_or_else(|| VendorEarnings { vendor_id: vendor_id.to_string(), ..VendorEarnings::default() }))
}
