use std::{collections::HashMap, fmt::Debug};

use chrono::Duration;
use log::*;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderStatusType},
    events::{
        EventProducers,
        OrderClaimedEvent,
        OrderPaidEvent,
        OrderStatusChangedEvent,
        OrdersPurgedEvent,
        PaymentFailedEvent,
    },
    order_objects::{CartItem, FeePolicy, PricedCart},
    state::{check_transition, is_vendor_target, TransitionError},
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

/// `OrderFlowApi` is the primary API for moving orders through their lifecycle: pricing carts, settling payments,
/// vendor and rider transitions, and the reconciliation sweeps.
///
/// Every mutation follows the same shape: validate against the state machine, perform a single conditional write,
/// and fire the matching event hooks only if the write actually changed something. The database write is the
/// transaction boundary; event delivery is fire-and-forget and never rolls anything back.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    pub fn db(&self) -> &B {
        &self.db
    }

    /// Prices a cart against the current catalog: snapshots unit prices and vendor attribution, totals the lines
    /// and applies the delivery-fee policy. The snapshot is taken exactly once; later catalog edits never affect
    /// this order.
    ///
    /// Fails with `EmptyCart`, `InvalidQuantity`, `UnknownFoodItem` or `ItemUnavailable`; nothing is persisted on
    /// failure.
    pub async fn price_cart(&self, cart: &[CartItem], policy: &FeePolicy) -> Result<PricedCart, PaymentGatewayError> {
        if cart.is_empty() {
            return Err(PaymentGatewayError::EmptyCart);
        }
        let ids = cart.iter().map(|i| i.food_item_id.clone()).collect::<Vec<_>>();
        let catalog =
            self.db.fetch_food_items(&ids).await?.into_iter().map(|f| (f.id.clone(), f)).collect::<HashMap<_, _>>();
        let mut items = Vec::with_capacity(cart.len());
        for line in cart {
            if line.quantity <= 0 {
                return Err(PaymentGatewayError::InvalidQuantity(line.food_item_id.clone()));
            }
            let food = catalog
                .get(&line.food_item_id)
                .ok_or_else(|| PaymentGatewayError::UnknownFoodItem(line.food_item_id.clone()))?;
            if !food.available {
                return Err(PaymentGatewayError::ItemUnavailable(line.food_item_id.clone()));
            }
            items.push(NewOrderItem {
                food_item_id: food.id.clone(),
                vendor_id: food.vendor_id.clone(),
                quantity: line.quantity,
                unit_price: food.price,
            });
        }
        let subtotal = items.iter().map(|i| i.unit_price * i.quantity).sum();
        let delivery_fee = policy.fee_for(subtotal);
        let total = subtotal + delivery_fee;
        trace!("🔄️📦️ Cart priced: subtotal {subtotal}, fee {delivery_fee}, total {total}");
        Ok(PricedCart { items, subtotal, delivery_fee, total })
    }

    /// Persists a fully-priced order (record and item lines, atomically). The order starts life in
    /// `placed`/`pending`; no events fire until payment settles.
    pub async fn place_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order {} placed by {} for {}", order.order_id, order.user_id, order.total);
        Ok(order)
    }

    /// Settles the order's payment. Idempotent: the client callback and the provider webhook may both land, in
    /// any sequence, and only the first one fires the paid hooks. Returns the order and whether this call was the
    /// one that settled it.
    pub async fn confirm_payment(
        &self,
        order_id: &OrderId,
        remote_payment_id: &str,
        remote_signature: Option<&str>,
    ) -> Result<(Order, bool), PaymentGatewayError> {
        let (order, newly_paid) = self.db.mark_order_paid(order_id, remote_payment_id, remote_signature).await?;
        if newly_paid {
            debug!("🔄️💰️ Payment for order {order_id} confirmed");
            let vendor_ids = self.db.vendor_ids_for_order(order_id).await.unwrap_or_else(|e| {
                warn!("🔄️💰️ Could not resolve vendors for {order_id}: {e}");
                Vec::new()
            });
            for emitter in &self.producers.order_paid_producer {
                emitter.publish_event(OrderPaidEvent { order: order.clone(), vendor_ids: vendor_ids.clone() }).await;
            }
        } else {
            debug!("🔄️💰️ Duplicate payment confirmation for {order_id} ignored");
        }
        Ok((order, newly_paid))
    }

    /// Records a failed payment attempt. Same idempotency contract as [`Self::confirm_payment`].
    pub async fn payment_failed(&self, order_id: &OrderId) -> Result<(Order, bool), PaymentGatewayError> {
        let (order, newly_failed) = self.db.mark_payment_failed(order_id).await?;
        if newly_failed {
            debug!("🔄️💰️ Payment for order {order_id} failed");
            let vendor_ids = self.db.vendor_ids_for_order(order_id).await.unwrap_or_default();
            for emitter in &self.producers.payment_failed_producer {
                emitter
                    .publish_event(PaymentFailedEvent { order: order.clone(), vendor_ids: vendor_ids.clone() })
                    .await;
            }
        }
        Ok((order, newly_failed))
    }

    /// A vendor moving one of their orders through the kitchen stages (`cooking`, `ready`).
    ///
    /// The vendor must own at least one item line in the order, the transition must be legal for the order's
    /// current status and payment state, and the conditional write must win any concurrent race. Fires the status
    /// hooks on success.
    pub async fn vendor_advance_order(
        &self,
        order_id: &OrderId,
        vendor_id: &str,
        target: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError> {
        if !is_vendor_target(target) {
            let order = self.fetch_order(order_id).await?;
            return Err(TransitionError::IllegalTransition { from: order.status, to: target }.into());
        }
        if !self.db.vendor_has_item_in_order(order_id, vendor_id).await? {
            return Err(PaymentGatewayError::VendorNotInOrder);
        }
        let order = self.fetch_order(order_id).await?;
        check_transition(order.status, target, order.payment_status)?;
        let updated = self
            .db
            .transition_order(order_id, order.status, target)
            .await?
            .ok_or(PaymentGatewayError::RaceLost)?;
        info!("🔄️📦️ Vendor {vendor_id} moved order {order_id} to {target}");
        self.fire_status_changed(&updated).await;
        Ok(updated)
    }

    /// A rider claiming a ready order. Exactly one of any number of concurrent claimants wins; everyone else sees
    /// the order as gone (`OrderNotFound`), the same as if another rider had claimed it moments earlier.
    pub async fn claim_order(&self, order_id: &OrderId, rider_id: &str) -> Result<Order, PaymentGatewayError> {
        let claimed = self
            .db
            .claim_order(order_id, rider_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        info!("🔄️🛵️ Order {order_id} claimed by rider {rider_id}");
        let vendor_ids = self.db.vendor_ids_for_order(order_id).await.unwrap_or_default();
        for emitter in &self.producers.order_claimed_producer {
            emitter.publish_event(OrderClaimedEvent { order: claimed.clone(), vendor_ids: vendor_ids.clone() }).await;
        }
        self.fire_status_changed(&claimed).await;
        Ok(claimed)
    }

    /// A rider declining an order. The order only disappears from that rider's claimable list; no state changes
    /// and nothing is broadcast.
    pub async fn decline_order(&self, order_id: &OrderId, rider_id: &str) -> Result<(), PaymentGatewayError> {
        // confirm the order exists so a typo'd id is reported rather than silently acked
        let _ = self.fetch_order(order_id).await?;
        self.db.decline_order(order_id, rider_id).await?;
        debug!("🔄️🛵️ Rider {rider_id} declined order {order_id}");
        Ok(())
    }

    /// The assigned rider completing a delivery. Only the rider on the order may complete it.
    pub async fn mark_delivered(&self, order_id: &OrderId, rider_id: &str) -> Result<Order, PaymentGatewayError> {
        let order = self.fetch_order(order_id).await?;
        match order.delivery_partner.as_deref() {
            Some(assigned) if assigned == rider_id => {},
            _ => return Err(PaymentGatewayError::NotYourDelivery),
        }
        check_transition(order.status, OrderStatusType::Delivered, order.payment_status)?;
        let delivered =
            self.db.mark_delivered(order_id, rider_id).await?.ok_or(PaymentGatewayError::RaceLost)?;
        info!("🔄️🛵️ Order {order_id} delivered by rider {rider_id}");
        self.fire_status_changed(&delivered).await;
        Ok(delivered)
    }

    /// Cancels orders stuck in `placed` for longer than `older_than`, in batches. Fires the status hooks
    /// for each cancelled order so owners and vendors are notified.
    pub async fn cancel_stale_orders(
        &self,
        older_than: Duration,
        batch: i64,
    ) -> Result<Vec<Order>, PaymentGatewayError> {
        let cancelled = self.db.cancel_stale_orders(older_than, batch).await?;
        for order in &cancelled {
            self.fire_status_changed(order).await;
        }
        Ok(cancelled)
    }

    /// Hard-deletes abandoned, never-paid orders older than `older_than`. Fires a single purge hook carrying the
    /// count.
    pub async fn purge_faulty_orders(&self, older_than: Duration) -> Result<u64, PaymentGatewayError> {
        let count = self.db.purge_unpaid_orders(older_than).await?;
        if count > 0 {
            for emitter in &self.producers.orders_purged_producer {
                emitter.publish_event(OrdersPurgedEvent { count }).await;
            }
        }
        Ok(count)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, PaymentGatewayError> {
        self.db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))
    }

    async fn fire_status_changed(&self, order: &Order) {
        let vendor_ids = self.db.vendor_ids_for_order(&order.order_id).await.unwrap_or_else(|e| {
            warn!("🔄️📦️ Could not resolve vendors for {}: {e}", order.order_id);
            Vec::new()
        });
        for emitter in &self.producers.order_status_changed_producer {
            emitter
                .publish_event(OrderStatusChangedEvent { order: order.clone(), vendor_ids: vendor_ids.clone() })
                .await;
        }
    }
}
