use campus_eats_engine::{db_types::Order, events::EventProducers, OrderFlowApi, SqliteDatabase};
use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);
const PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// Starts the stale-order sweep. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every minute, orders that have sat in `placed` for longer than `auto_cancel_after` are cancelled (in
/// batches of `sweep_batch`), firing the usual status hooks so owners and vendors hear about it. A failed sweep
/// is logged and retried on the next tick; it never takes the server down.
pub fn start_stale_order_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    auto_cancel_after: Duration,
    sweep_batch: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(SWEEP_INTERVAL);
        let api = OrderFlowApi::new(db, producers);
        info!("🕰️ Stale order sweep started (cancelling after {auto_cancel_after})");
        loop {
            timer.tick().await;
            trace!("🕰️ Running stale order sweep");
            match api.cancel_stale_orders(auto_cancel_after, sweep_batch).await {
                Ok(cancelled) if cancelled.is_empty() => trace!("🕰️ No stale orders found"),
                Ok(cancelled) => {
                    info!("🕰️ {} stale orders auto-cancelled", cancelled.len());
                    debug!("🕰️ Cancelled: {}", order_list(&cancelled));
                },
                Err(e) => error!("🕰️ Error running stale order sweep: {e}"),
            }
        }
    })
}

/// Starts the unpaid-order purge. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Runs shortly after startup and then daily, hard-deleting never-paid orders (and their item lines) older than
/// `purge_unpaid_after`.
pub fn start_purge_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    purge_unpaid_after: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(PURGE_INTERVAL);
        let api = OrderFlowApi::new(db, producers);
        info!("🕰️ Unpaid order purge started (purging after {purge_unpaid_after})");
        loop {
            timer.tick().await;
            debug!("🕰️ Running unpaid order purge");
            match api.purge_faulty_orders(purge_unpaid_after).await {
                Ok(0) => debug!("🕰️ Nothing to purge"),
                Ok(n) => info!("🕰️ Purged {n} abandoned orders"),
                Err(e) => error!("🕰️ Error running unpaid order purge: {e}"),
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} user_id: {}", o.id, o.order_id, o.user_id))
        .collect::<Vec<String>>()
        .join(", ")
}
