//----------------------------------------------   Webhooks  ----------------------------------------------------
//! Provider webhook handlers.
//!
//! The provider delivers payment and refund outcomes at least once and in no particular order, and keeps
//! redelivering anything that is not answered with a 200-range status. These handlers therefore always answer
//! 200; the JSON body says whether processing actually succeeded, and genuine anomalies are logged for the
//! operator. Authenticity is the HMAC middleware's job, which runs before any of this.
use actix_web::{web, web::ServiceConfig, HttpResponse};
use gateway_tools::{PaymentEventPayload, RefundEventPayload};
use log::*;
use storefront_payment_engine::{
    db_types::{Actor, RequestMeta},
    traits::{AuditStore, OrderStore, PaymentGateway},
    PaymentReconciler,
    ReconcileError,
    ReconcileOutcome,
    RefundCoordinator,
    RefundError,
};

use crate::{data_objects::JsonResponse, integrations::gateway::{payment_event_from_payload, refund_event_from_payload}};

/// The actor recorded in the ledger for webhook-driven mutations.
pub const WEBHOOK_ACTOR: &str = "gateway-webhook";

pub async fn payment_webhook<B, G>(
    body: web::Json<PaymentEventPayload>,
    reconciler: web::Data<PaymentReconciler<B, G>>,
) -> HttpResponse
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    let payload = body.into_inner();
    trace!("🔔️ Received payment webhook for event {}", payload.event_id);
    let event = match payment_event_from_payload(payload) {
        Ok(Some(event)) => event,
        Ok(None) => return HttpResponse::Ok().json(JsonResponse::success("Nothing to reconcile yet.")),
        Err(e) => {
            warn!("🔔️ Could not convert payment webhook payload. {e}");
            return HttpResponse::Ok().json(JsonResponse::failure(e));
        },
    };
    let actor = Actor::system(WEBHOOK_ACTOR);
    let result = match reconciler.reconcile(event, &actor, &RequestMeta::default()).await {
        Ok(ReconcileOutcome::Applied(order)) => {
            info!("🔔️ Order {} reconciled to {}", order.order_id, order.payment_status);
            JsonResponse::success("Event applied.")
        },
        Ok(ReconcileOutcome::AlreadyApplied(order)) => {
            debug!("🔔️ Redelivery for order {} ignored.", order.order_id);
            JsonResponse::success("Event already applied.")
        },
        Ok(ReconcileOutcome::StillPending(order)) => {
            debug!("🔔️ Order {} still pending.", order.order_id);
            JsonResponse::success("Nothing to reconcile yet.")
        },
        Err(e @ ReconcileError::UnknownOrder(_)) => {
            // Logged without state mutation; the provider should not keep redelivering this
            warn!("🔔️ {e}");
            JsonResponse::failure(e)
        },
        Err(e) => {
            warn!("🔔️ Could not reconcile payment event. {e}");
            JsonResponse::failure(e)
        },
    };
    HttpResponse::Ok().json(result)
}

pub async fn refund_webhook<B, G>(
    body: web::Json<RefundEventPayload>,
    refunds: web::Data<RefundCoordinator<B, G>>,
) -> HttpResponse
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    let payload = body.into_inner();
    trace!("🔔️ Received refund webhook for event {}", payload.event_id);
    let event = match refund_event_from_payload(payload) {
        Some(event) => event,
        None => return HttpResponse::Ok().json(JsonResponse::success("Nothing to resolve yet.")),
    };
    let actor = Actor::system(WEBHOOK_ACTOR);
    let result = match refunds.resolve_refund(&event.refund_id, event.outcome, &actor, &RequestMeta::default()).await
    {
        Ok(order) => {
            info!("🔔️ Refund {} resolved as {}; order {} updated.", event.refund_id, event.outcome, order.order_id);
            JsonResponse::success("Refund resolved.")
        },
        Err(e @ RefundError::UnknownRefund(_)) => {
            warn!("🔔️ {e}");
            JsonResponse::failure(e)
        },
        Err(e) => {
            warn!("🔔️ Could not resolve refund event. {e}");
            JsonResponse::failure(e)
        },
    };
    HttpResponse::Ok().json(result)
}

/// Registers the webhook endpoints under the scope they are mounted on. The HMAC middleware wraps the scope, not
/// the individual resources, so every webhook route is covered.
pub fn configure_webhooks<B, G>(cfg: &mut ServiceConfig)
where
    B: OrderStore + AuditStore + 'static,
    G: PaymentGateway + 'static,
{
    cfg.service(web::resource("/webhook/payment").route(web::post().to(payment_webhook::<B, G>)))
        .service(web::resource("/webhook/refund").route(web::post().to(refund_webhook::<B, G>)));
}
