//! The scheduled reconciliation sweep.
//!
//! Webhooks are the fast path, but they can be lost, delayed, or arrive while the server is down. The sweep is the
//! slow path that guarantees convergence: every interval it asks the provider about payments and refunds that have
//! sat in `Pending` for longer than the grace period, and feeds the answers through the exact same idempotent
//! reconcile/resolve paths the webhooks use. Racing a webhook is therefore harmless.
use chrono::Utc;
use log::*;
use storefront_payment_engine::{
    db_types::{Actor, PaymentStatus, RefundStatus},
    helpers::BackoffPolicy,
    spe_api::objects::OrderQueryFilter,
    traits::OrderStore,
    PaymentReconciler,
    ReconcileOutcome,
    RefundCoordinator,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

use crate::integrations::gateway::RestPaymentGateway;

/// The actor recorded in the ledger for sweep-driven mutations.
pub const POLLER_ACTOR: &str = "reconciliation-poller";

/// Starts the reconciliation sweep. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_poll_worker(
    db: SqliteDatabase,
    gateway: RestPaymentGateway,
    policy: BackoffPolicy,
    interval: std::time::Duration,
    pending_age: chrono::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let reconciler = PaymentReconciler::new(db.clone(), gateway.clone(), policy);
        let refunds = RefundCoordinator::new(db.clone(), gateway, policy);
        let actor = Actor::system(POLLER_ACTOR);
        info!("🕰️ Reconciliation sweep started (every {interval:?})");
        loop {
            timer.tick().await;
            sweep_pending_payments(&db, &reconciler, &actor, pending_age).await;
            sweep_pending_refunds(&db, &refunds, &actor, pending_age).await;
        }
    })
}

async fn sweep_pending_payments(
    db: &SqliteDatabase,
    reconciler: &PaymentReconciler<SqliteDatabase, RestPaymentGateway>,
    actor: &Actor,
    pending_age: chrono::Duration,
) {
    let query = OrderQueryFilter::default().with_payment_status(PaymentStatus::Pending);
    let orders = match db.search_orders(query).await {
        Ok(orders) => orders,
        Err(e) => {
            error!("🕰️ Could not list pending payments for the sweep: {e}");
            return;
        },
    };
    let cutoff = Utc::now() - pending_age;
    let mut applied = 0usize;
    for order in orders {
        // Orders without a reference cannot be verified yet; fresh ones are left for the webhook
        if order.payment_reference.is_none() || order.updated_at > cutoff {
            continue;
        }
        match reconciler.verify_and_reconcile(&order.order_id, actor).await {
            Ok(ReconcileOutcome::Applied(updated)) => {
                info!("🕰️ Sweep resolved payment for order {}: {}", updated.order_id, updated.payment_status);
                applied += 1;
            },
            Ok(_) => {},
            Err(e) => {
                warn!("🕰️ Sweep could not resolve payment for order {}: {e}", order.order_id);
            },
        }
    }
    if applied > 0 {
        info!("🕰️ Sweep applied {applied} payment resolution(s)");
    }
}

async fn sweep_pending_refunds(
    db: &SqliteDatabase,
    refunds: &RefundCoordinator<SqliteDatabase, RestPaymentGateway>,
    actor: &Actor,
    pending_age: chrono::Duration,
) {
    let query = OrderQueryFilter::default().with_refund_status(RefundStatus::Pending);
    let orders = match db.search_orders(query).await {
        Ok(orders) => orders,
        Err(e) => {
            error!("🕰️ Could not list pending refunds for the sweep: {e}");
            return;
        },
    };
    let cutoff = Utc::now() - pending_age;
    for order in orders {
        let refund = match &order.refund {
            Some(r) if r.requested_at <= cutoff => r.clone(),
            _ => continue,
        };
        match refunds.poll_refund(&refund.refund_id, actor).await {
            Ok(Some(updated)) => {
                info!("🕰️ Sweep resolved refund {} on order {}", refund.refund_id, updated.order_id);
            },
            Ok(None) => {
                trace!("🕰️ Refund {} still pending at the provider", refund.refund_id);
            },
            Err(e) => {
                warn!("🕰️ Sweep could not resolve refund {}: {e}", refund.refund_id);
            },
        }
    }
}
