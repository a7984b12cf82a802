use campus_eats_engine::{
    db_types::{DeliveryAddress, NewOrder, Order, OrderId},
    events::EventHooks,
    order_objects::{CartItem, FeePolicy},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::PaymentGatewayDatabase,
    OrderFlowApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub async fn setup() -> OrderFlowApi<SqliteDatabase> {
    setup_with_hooks(EventHooks::default()).await.0
}

pub async fn setup_with_hooks(
    hooks: EventHooks,
) -> (OrderFlowApi<SqliteDatabase>, campus_eats_engine::events::EventHandlers) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    seed_catalog(&db).await;
    let handlers = campus_eats_engine::events::EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    (OrderFlowApi::new(db, producers), handlers)
}

pub async fn tear_down(api: OrderFlowApi<SqliteDatabase>) {
    let url = api.db().url().to_string();
    drop(api);
    if let Err(e) = Sqlite::drop_database(&url).await {
        error!("🚀️ Failed to drop database {url}: {e}");
    }
}

/// Two vendors, three items. `idli` is marked unavailable.
pub async fn seed_catalog(db: &SqliteDatabase) {
    let pool = db.pool();
    sqlx::query("INSERT INTO vendors (id, name) VALUES ('v-dosa', 'Dosa Corner'), ('v-wok', 'Wok Stop')")
        .execute(pool)
        .await
        .expect("Error seeding vendors");
    sqlx::query(
        r#"INSERT INTO food_items (id, vendor_id, name, price, available) VALUES
            ('masala-dosa', 'v-dosa', 'Masala Dosa', 6000, TRUE),
            ('idli', 'v-dosa', 'Idli Plate', 4000, FALSE),
            ('hakka-noodles', 'v-wok', 'Hakka Noodles', 12000, TRUE)"#,
    )
    .execute(pool)
    .await
    .expect("Error seeding food items");
    sqlx::query("INSERT INTO vendor_users (user_id, vendor_id) VALUES ('dosa-staff', 'v-dosa')")
        .execute(pool)
        .await
        .expect("Error seeding vendor users");
}

pub fn address() -> DeliveryAddress {
    DeliveryAddress {
        label: Some("Hostel".to_string()),
        line1: "Block C, Room 214".to_string(),
        line2: None,
        landmark: Some("next to the night canteen".to_string()),
    }
}

pub fn dosa_cart(quantity: i64) -> Vec<CartItem> {
    vec![CartItem { food_item_id: "masala-dosa".to_string(), quantity }]
}

/// Prices the cart and places the order, returning it in `placed`/`pending`.
pub async fn place_order(api: &OrderFlowApi<SqliteDatabase>, user_id: &str, cart: &[CartItem]) -> Order {
    let priced = api.price_cart(cart, &FeePolicy::default()).await.expect("Error pricing cart");
    let order_id = OrderId::random();
    let new_order = NewOrder {
        order_id: order_id.clone(),
        user_id: user_id.to_string(),
        address: address(),
        subtotal: priced.subtotal,
        delivery_fee: priced.delivery_fee,
        total: priced.total,
        currency: "INR".to_string(),
        provider: "razorpay".to_string(),
        remote_order_id: format!("rzp_{}", order_id.as_str()),
        items: priced.items,
    };
    api.place_order(new_order).await.expect("Error placing order")
}

/// Places an order and settles its payment, leaving it `placed`/`paid`.
pub async fn place_paid_order(api: &OrderFlowApi<SqliteDatabase>, user_id: &str, cart: &[CartItem]) -> Order {
    let order = place_order(api, user_id, cart).await;
    let (order, newly_paid) =
        api.confirm_payment(&order.order_id, "pay_test", Some("sig_test")).await.expect("Error confirming payment");
    assert!(newly_paid);
    order
}

/// Rewinds an order's `created_at` so the reconciliation sweeps see it as old.
pub async fn backdate_order(db: &SqliteDatabase, order_id: &OrderId, modifier: &str) {
    sqlx::query("UPDATE orders SET created_at = datetime('now', $1) WHERE order_id = $2")
        .bind(modifier)
        .bind(order_id.as_str())
        .execute(db.pool())
        .await
        .expect("Error backdating order");
}
