//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Payment endpoints (checkout, callback verification, webhooks) live in [`crate::payment_routes`].
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database operations, etc.)
//! must be expressed as futures or asynchronous functions.
use actix_web::{get, web, HttpResponse, Responder};
use campus_eats_engine::{
    db_types::{Order, OrderId, OrderStatusType, Role},
    traits::{OrderManagement, PaymentGatewayDatabase},
    OrderFlowApi,
};
use futures::StreamExt;
use log::*;
use serde_json::json;

use crate::{
    auth::JwtClaims,
    broadcaster::{Broadcaster, Room},
    config::ServerConfig,
    data_objects::{JsonResponse, StatusUpdateRequest, SubscribeRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:ty),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:ty),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Students  ----------------------------------------------------

route!(my_orders => Get "/orders" impl PaymentGatewayDatabase where requires [Role::Student]);
/// Route handler for the orders endpoint
///
/// Authenticated students fetch their own orders here. The user id comes from the JWT supplied in the
/// `Authorization` header; there is no way to fetch another student's orders.
pub async fn my_orders<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", claims.sub);
    let orders = api.db().fetch_orders_for_user(&claims.sub).await.map_err(|e| {
        debug!("💻️ Could not fetch orders. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/order/id/{order_id}" impl PaymentGatewayDatabase where requires [Role::Student, Role::Vendor, Role::Rider]);
/// Use `/order/id/{order_id}` to fetch a specific order, with its line items.
///
/// Access follows involvement: the owning student, the rider who claimed it, and any vendor with a line in it may
/// see the order. Everyone else gets a 404, whether the order exists or not.
pub async fn order_by_id<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id}) for {}", claims.sub);
    let db = api.db();
    let order = db
        .fetch_order_by_order_id(&order_id)
        .await
        .map_err(|e| {
            debug!("💻️ Could not fetch order. {e}");
            ServerError::BackendError(e.to_string())
        })?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    if !caller_may_view(&claims, &order, db).await? {
        debug!("💻️ {} is not involved in {order_id}; hiding it", claims.sub);
        return Err(ServerError::NoRecordFound(format!("Order {order_id}")));
    }
    let items = db.fetch_order_items(&order_id).await.map_err(|e| {
        debug!("💻️ Could not fetch order items. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(json!({ "order": order, "items": items })))
}

async fn caller_may_view<B: OrderManagement>(
    claims: &JwtClaims,
    order: &Order,
    db: &B,
) -> Result<bool, ServerError> {
    let permitted = match claims.role {
        Role::Admin => true,
        Role::Student => order.user_id == claims.sub,
        Role::Rider => order.delivery_partner.as_deref() == Some(claims.sub.as_str()),
        Role::Vendor => {
            let vendor_id = resolve_vendor_identity(claims, db).await?;
            db.vendor_has_item_in_order(&order.order_id, &vendor_id).await.map_err(|e| {
                debug!("💻️ Could not check vendor involvement. {e}");
                ServerError::BackendError(e.to_string())
            })?
        },
    };
    Ok(permitted)
}

//----------------------------------------------   Vendors  ----------------------------------------------------

/// Resolves which vendor the caller acts for. The token may carry the vendor id directly; staff accounts fall back
/// to the vendor-user linkage in storage.
pub async fn resolve_vendor_identity<B: OrderManagement>(
    claims: &JwtClaims,
    db: &B,
) -> Result<String, ServerError> {
    if let Some(vendor_id) = &claims.vendor_id {
        return Ok(vendor_id.clone());
    }
    trace!("💻️ Token for {} carries no vendor id. Checking the staff linkage.", claims.sub);
    let vendor_id = db
        .resolve_vendor_for_user(&claims.sub)
        .await
        .map_err(|e| {
            debug!("💻️ Could not resolve vendor for {}. {e}", claims.sub);
            ServerError::BackendError(e.to_string())
        })?
        .ok_or_else(|| {
            debug!("💻️ {} is not linked to any vendor", claims.sub);
            ServerError::InsufficientPermissions("This account is not linked to a vendor.".to_string())
        })?;
    Ok(vendor_id)
}

route!(vendor_orders => Get "/vendor/orders" impl PaymentGatewayDatabase where requires [Role::Vendor]);
/// The vendor's kitchen board: every active order containing at least one of their items.
///
/// Unpaid orders only show up while they are fresh (the grace window); a checkout abandoned at the payment screen
/// disappears from the board on its own rather than lingering as noise.
pub async fn vendor_orders<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let vendor_id = resolve_vendor_identity(&claims, api.db()).await?;
    debug!("💻️ GET vendor_orders for {vendor_id}");
    let orders = api.db().fetch_orders_for_vendor(&vendor_id, config.vendor_grace).await.map_err(|e| {
        debug!("💻️ Could not fetch vendor orders. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(vendor_advance => Patch "/vendor/order/{order_id}/status" impl PaymentGatewayDatabase where requires [Role::Vendor]);
/// Vendors push an order forward through the kitchen stages (`cooking`, `ready`).
///
/// The engine enforces the lifecycle: the order must be paid, the vendor must have an item in it, and the step
/// must be the legal next one. A concurrent update by another staff member surfaces as a 409.
pub async fn vendor_advance<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let target = body.into_inner().status;
    let vendor_id = resolve_vendor_identity(&claims, api.db()).await?;
    info!("💻️ Vendor {vendor_id} advancing {order_id} to {target}");
    let order = api.vendor_advance_order(&order_id, &vendor_id, target).await.map_err(|e| {
        debug!("💻️ Could not advance order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(vendor_earnings => Get "/vendor/earnings" impl PaymentGatewayDatabase where requires [Role::Vendor]);
/// Lifetime earnings summary for the caller's vendor, counted over delivered orders only.
pub async fn vendor_earnings<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let vendor_id = resolve_vendor_identity(&claims, api.db()).await?;
    debug!("💻️ GET vendor_earnings for {vendor_id}");
    let earnings = api.db().earnings_for_vendor(&vendor_id).await.map_err(|e| {
        debug!("💻️ Could not fetch earnings. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(earnings))
}

//----------------------------------------------   Riders  ----------------------------------------------------

route!(claimable_orders => Get "/rider/claimable" impl PaymentGatewayDatabase where requires [Role::Rider]);
/// Orders a rider can pick up: paid, marked ready by the kitchen, not yet claimed, and not previously declined by
/// this rider. Oldest first, so long-waiting orders surface at the top.
pub async fn claimable_orders<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET claimable_orders for {}", claims.sub);
    let orders = api.db().fetch_claimable_orders(&claims.sub).await.map_err(|e| {
        debug!("💻️ Could not fetch claimable orders. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(my_deliveries => Get "/rider/deliveries" impl PaymentGatewayDatabase where requires [Role::Rider]);
pub async fn my_deliveries<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_deliveries for {}", claims.sub);
    let orders = api.db().fetch_orders_for_rider(&claims.sub).await.map_err(|e| {
        debug!("💻️ Could not fetch deliveries. {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(claim_order => Post "/rider/claim/{order_id}" impl PaymentGatewayDatabase where requires [Role::Rider]);
/// Claims a ready order for delivery. The claim is atomic: when two riders race for the same order, exactly one
/// wins. The loser sees the order as gone (404), same as if another rider had already taken it minutes ago.
pub async fn claim_order<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ Rider {} claiming {order_id}", claims.sub);
    let order = api.claim_order(&order_id, &claims.sub).await.map_err(|e| {
        debug!("💻️ Order claim failed. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(decline_order => Post "/rider/decline/{order_id}" impl PaymentGatewayDatabase where requires [Role::Rider]);
/// Hides an order from this rider's claimable feed. Other riders still see it.
pub async fn decline_order<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ Rider {} declining {order_id}", claims.sub);
    api.decline_order(&order_id, &claims.sub).await.map_err(|e| {
        debug!("💻️ Could not decline order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Order declined.")))
}

route!(mark_delivered => Post "/rider/delivered/{order_id}" impl PaymentGatewayDatabase where requires [Role::Rider]);
/// Completes a delivery. Only the rider who claimed the order may mark it delivered.
pub async fn mark_delivered<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ Rider {} delivered {order_id}", claims.sub);
    let order = api.mark_delivered(&order_id, &claims.sub).await.map_err(|e| {
        debug!("💻️ Could not mark order delivered. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Live events  ----------------------------------------------------

route!(event_stream => Get "/events" impl PaymentGatewayDatabase where requires [Role::Student, Role::Vendor, Role::Rider]);
/// Opens the live event stream (server-sent events).
///
/// Every caller joins their own `user:{id}` room and the global room; vendor tokens also join their
/// `vendor:{id}` room. The first frame is a `connected` event carrying the connection id, which the client echoes
/// to `/events/subscribe` to watch individual orders. Delivery is best-effort with no replay.
pub async fn event_stream<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
    broadcaster: web::Data<Broadcaster>,
) -> Result<HttpResponse, ServerError> {
    let mut rooms = vec![Room::User(claims.sub.clone()), Room::Global];
    if claims.role == Role::Vendor {
        let vendor_id = resolve_vendor_identity(&claims, api.db()).await?;
        rooms.push(Room::Vendor(vendor_id));
    }
    let (conn_id, mut rx) = broadcaster.register(&rooms);
    debug!("💻️ Event stream {conn_id} opened for {}", claims.sub);
    let guard = DisconnectOnDrop { broadcaster: broadcaster.get_ref().clone(), conn_id };
    let stream = futures::stream::poll_fn(move |cx| {
        let _ = &guard;
        rx.poll_recv(cx)
    })
    .map(Ok::<_, actix_web::Error>);
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

/// Unregisters the connection when the client closes the stream, instead of waiting for the next publish to
/// notice the dead channel.
struct DisconnectOnDrop {
    broadcaster: Broadcaster,
    conn_id: u64,
}

impl Drop for DisconnectOnDrop {
    fn drop(&mut self) {
        self.broadcaster.disconnect(self.conn_id);
    }
}

route!(subscribe_to_order => Post "/events/subscribe" impl PaymentGatewayDatabase where requires [Role::Student, Role::Vendor, Role::Rider]);
/// Joins an open event-stream connection to an order room, for live tracking of a single order. The caller must
/// be involved in the order, under the same rules as fetching it.
pub async fn subscribe_to_order<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    body: web::Json<SubscribeRequest>,
    api: web::Data<OrderFlowApi<B>>,
    broadcaster: web::Data<Broadcaster>,
) -> Result<HttpResponse, ServerError> {
    let SubscribeRequest { conn_id, order_id } = body.into_inner();
    let db = api.db();
    let order = db
        .fetch_order_by_order_id(&order_id)
        .await
        .map_err(|e| {
            debug!("💻️ Could not fetch order. {e}");
            ServerError::BackendError(e.to_string())
        })?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    if !caller_may_view(&claims, &order, db).await? {
        debug!("💻️ {} is not involved in {order_id}; refusing subscription", claims.sub);
        return Err(ServerError::NoRecordFound(format!("Order {order_id}")));
    }
    if broadcaster.subscribe(conn_id, Room::Order(order_id.as_str().to_string())) {
        Ok(HttpResponse::Ok().json(JsonResponse::success("Subscribed.")))
    } else {
        Err(ServerError::InvalidInput("The event stream connection is no longer open.".to_string()))
    }
}
