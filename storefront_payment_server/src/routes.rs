//! Request handler definitions for the admin console API.
//!
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the storage backend and gateway so that the endpoint tests can run them against
//! mocks. Registration happens in [`configure_api`], which wraps each resource in the ACL middleware with the
//! roles that route requires: `ReadAll` for queries, `Write` for mutations.
use actix_web::{get, web, web::ServiceConfig, HttpRequest, HttpResponse, Responder};
use log::*;
use storefront_payment_engine::{
    db_types::{OrderId, Role},
    spe_api::objects::{AuditQueryFilter, OrderQueryFilter},
    traits::{AuditStore, OrderStore, PaymentGateway},
    AdminApi,
};

use crate::{
    auth::AuthContext,
    config::ServerOptions,
    data_objects::{RefundParams, TransitionOrderParams},
    errors::ServerError,
    helpers::request_meta,
    middleware::AclMiddlewareFactory,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

/// Route handler for the order search endpoint.
///
/// Admins with the `ReadAll` role can filter on status, payment status, refund status, customer, currency and
/// creation time. Results are newest-first.
pub async fn orders_search<B, G>(
    query: web::Query<OrderQueryFilter>,
    api: web::Data<AdminApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    debug!("💻️ GET orders search for [{query}]", query = query.0);
    let orders = api.list_orders(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

/// Route handler for fetching a single order, line items included.
pub async fn order_by_id<B, G>(
    path: web::Path<String>,
    api: web::Data<AdminApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order {order_id}");
    let order = api
        .get_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} not found")))?;
    Ok(HttpResponse::Ok().json(order))
}

/// Route handler for administrative fulfillment transitions.
///
/// The body carries the target status and the order version the console last saw. A `409` means someone else got
/// there first: re-fetch the order and try again. A `400` means the transition itself is not legal. A `500` with
/// `kind: "integrity"` means the change committed but its audit entry did not — a condition that must reach the
/// operator rather than being retried blindly.
pub async fn transition_order<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<TransitionOrderParams>,
    auth: AuthContext,
    options: web::Data<ServerOptions>,
    api: web::Data<AdminApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    let params = body.into_inner();
    let meta = request_meta(&req, options.use_x_forwarded_for, options.use_forwarded);
    debug!("💻️ POST transition {order_id} -> {} by {}", params.target, auth.actor.id);
    let order = api
        .transition_order(&order_id, params.expected_version, params.target, &auth.actor, &meta)
        .await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Route handler for initiating a refund against a paid order.
pub async fn refund_order<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<RefundParams>,
    auth: AuthContext,
    options: web::Data<ServerOptions>,
    api: web::Data<AdminApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    let params = body.into_inner();
    let meta = request_meta(&req, options.use_x_forwarded_for, options.use_forwarded);
    debug!("💻️ POST refund {order_id} of {} by {}", params.amount, auth.actor.id);
    let order = api.initiate_refund(&order_id, params.amount, &params.reason, &auth.actor, &meta).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Audit  ----------------------------------------------------

/// Route handler for searching the audit ledger. Entries come back newest-first and are never anything but a
/// faithful record: there is no mutation surface here.
pub async fn audit_search<B, G>(
    query: web::Query<AuditQueryFilter>,
    api: web::Data<AdminApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    debug!("💻️ GET audit search");
    let entries = api.list_audit_entries(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(entries))
}

/// Registers the admin console API under the scope it is mounted on.
pub fn configure_api<B, G>(cfg: &mut ServiceConfig)
where
    B: OrderStore + AuditStore + 'static,
    G: PaymentGateway + 'static,
{
    cfg.service(
        web::resource("/orders")
            .wrap(AclMiddlewareFactory::new(&[Role::ReadAll]))
            .route(web::get().to(orders_search::<B, G>)),
    )
    .service(
        web::resource("/orders/{order_id}")
            .wrap(AclMiddlewareFactory::new(&[Role::ReadAll]))
            .route(web::get().to(order_by_id::<B, G>)),
    )
    .service(
        web::resource("/orders/{order_id}/transition")
            .wrap(AclMiddlewareFactory::new(&[Role::Write]))
            .route(web::post().to(transition_order::<B, G>)),
    )
    .service(
        web::resource("/orders/{order_id}/refund")
            .wrap(AclMiddlewareFactory::new(&[Role::Write]))
            .route(web::post().to(refund_order::<B, G>)),
    )
    .service(
        web::resource("/audit")
            .wrap(AclMiddlewareFactory::new(&[Role::ReadAll]))
            .route(web::get().to(audit_search::<B, G>)),
    );
}
