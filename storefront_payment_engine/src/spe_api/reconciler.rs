use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        Actor,
        GatewayPaymentEvent,
        Order,
        OrderId,
        OrderTransition,
        PaymentEventOutcome,
        PaymentStatus,
        RequestMeta,
    },
    helpers::{retry_transient, BackoffPolicy},
    spe_api::{errors::ReconcileError, lifecycle::OrderLifecycleApi},
    traits::{AuditStore, OrderStore, PaymentGateway},
};

/// What a reconciliation attempt did.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The event changed order state (exactly one audit entry was written for it).
    Applied(Order),
    /// The event had already been applied; this delivery was a no-op.
    AlreadyApplied(Order),
    /// Poll path only: the provider still has the payment in flight, nothing to record yet.
    StillPending(Order),
}

impl ReconcileOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ReconcileOutcome::Applied(o) | ReconcileOutcome::AlreadyApplied(o) | ReconcileOutcome::StillPending(o) => o,
        }
    }
}

/// `PaymentReconciler` translates provider confirmations into state-machine transitions, applying each event's
/// effect at most once regardless of how many times the provider delivers it.
pub struct PaymentReconciler<B, G> {
    db: B,
    gateway: G,
    lifecycle: OrderLifecycleApi<B>,
    policy: BackoffPolicy,
}

impl<B: Clone, G: Clone> Clone for PaymentReconciler<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: self.gateway.clone(),
            lifecycle: self.lifecycle.clone(),
            policy: self.policy,
        }
    }
}

impl<B, G> Debug for PaymentReconciler<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentReconciler")
    }
}

impl<B: Clone, G> PaymentReconciler<B, G> {
    pub fn new(db: B, gateway: G, policy: BackoffPolicy) -> Self {
        Self { lifecycle: OrderLifecycleApi::new(db.clone()), db, gateway, policy }
    }
}

impl<B, G> PaymentReconciler<B, G>
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    /// Applies a provider confirmation to the matching order.
    ///
    /// Redeliveries are answered with success without touching state: if the order already carries this event's
    /// payment reference and its payment status already reflects the outcome, there is nothing left to do. A
    /// `VersionConflict` (an admin edit raced the confirmation) is retried once against the re-read order; if it
    /// conflicts again, `ReconciliationConflict` is surfaced for human review rather than silently dropped.
    pub async fn reconcile(
        &self,
        event: GatewayPaymentEvent,
        actor: &Actor,
        meta: &RequestMeta,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let order = self
            .db
            .fetch_order(&event.order_id)
            .await?
            .ok_or_else(|| {
                warn!("🔄️ Event {} names order {} which does not exist. Ignoring it.", event.event_id, event.order_id);
                ReconcileError::UnknownOrder(event.order_id.clone())
            })?;
        if event.outcome == PaymentEventOutcome::Paid &&
            (event.amount != order.total_price || event.currency != order.currency)
        {
            error!(
                "🔄️ Event {} reports {} {} for order {}, but the order is {} {}. Refusing to reconcile.",
                event.event_id, event.amount, event.currency, order.order_id, order.total_price, order.currency
            );
            return Err(ReconcileError::AmountMismatch { event_id: event.event_id, order_id: order.order_id });
        }
        if Self::already_applied(&order, &event) {
            debug!("🔄️ Event {} for order {} was already applied. No-op.", event.event_id, order.order_id);
            return Ok(ReconcileOutcome::AlreadyApplied(order));
        }
        let transition = match event.outcome {
            PaymentEventOutcome::Paid => {
                OrderTransition::PaymentReceived { payment_reference: event.payment_reference.clone() }
            },
            PaymentEventOutcome::Failed => OrderTransition::PaymentFailed,
        };
        match self.lifecycle.apply(&order.order_id, order.version, transition.clone(), actor, meta).await {
            Ok(updated) => {
                info!("🔄️ Event {} reconciled: order {} is now {}", event.event_id, updated.order_id, updated.payment_status);
                Ok(ReconcileOutcome::Applied(updated))
            },
            Err(crate::spe_api::errors::OrderLifecycleError::VersionConflict { .. }) => {
                debug!(
                    "🔄️ Event {} raced another writer on order {}. Re-reading and retrying once.",
                    event.event_id, order.order_id
                );
                let fresh = self
                    .db
                    .fetch_order(&event.order_id)
                    .await?
                    .ok_or_else(|| ReconcileError::UnknownOrder(event.order_id.clone()))?;
                if Self::already_applied(&fresh, &event) {
                    // The race was this very event arriving through another channel
                    return Ok(ReconcileOutcome::AlreadyApplied(fresh));
                }
                match self.lifecycle.apply(&fresh.order_id, fresh.version, transition, actor, meta).await {
                    Ok(updated) => Ok(ReconcileOutcome::Applied(updated)),
                    Err(crate::spe_api::errors::OrderLifecycleError::VersionConflict { .. }) => {
                        error!(
                            "🔄️🚨 Event {} still conflicts with concurrent edits to order {} after a retry. A \
                             conflicting admin edit next to a genuine payment confirmation needs human review.",
                            event.event_id, fresh.order_id
                        );
                        Err(ReconcileError::ReconciliationConflict {
                            event_id: event.event_id,
                            order_id: fresh.order_id,
                        })
                    },
                    Err(e) => Err(e.into()),
                }
            },
            Err(e) => Err(e.into()),
        }
    }

    /// The poll path: asks the provider for its current view of the order's payment and feeds the answer through
    /// [`Self::reconcile`]. Timeouts and 5xx responses are retried with bounded backoff; if the provider cannot be
    /// reached within the budget the payment is reported as *unresolved* (not failed) and is safe to poll again.
    pub async fn verify_and_reconcile(
        &self,
        order_id: &OrderId,
        actor: &Actor,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| ReconcileError::UnknownOrder(order_id.clone()))?;
        if order.payment_status != PaymentStatus::Pending {
            return Ok(ReconcileOutcome::AlreadyApplied(order));
        }
        let reference = match &order.payment_reference {
            Some(r) => r.clone(),
            None => {
                // Nothing to verify against; the confirmation has to arrive by webhook first.
                return Ok(ReconcileOutcome::StillPending(order));
            },
        };
        let payment = retry_transient(
            &self.policy,
            || self.gateway.verify_payment(&reference),
            |e| e.is_transient(),
            "verify_payment",
        )
        .await
        .map_err(|e| {
            warn!(
                "🔄️ Could not resolve payment {reference} for order {order_id} with the provider after {} \
                 attempt(s): {}",
                e.attempts, e.error
            );
            ReconcileError::Unresolved(order_id.clone())
        })?;
        match payment.outcome {
            None => {
                trace!("🔄️ Payment {reference} for order {order_id} is still in flight at the provider.");
                Ok(ReconcileOutcome::StillPending(order))
            },
            Some(outcome) => {
                let event = GatewayPaymentEvent {
                    event_id: format!("poll-{reference}"),
                    order_id: order.order_id.clone(),
                    payment_reference: reference,
                    outcome,
                    amount: payment.amount,
                    currency: payment.currency,
                };
                self.reconcile(event, actor, &RequestMeta::default()).await
            },
        }
    }

    fn already_applied(order: &Order, event: &GatewayPaymentEvent) -> bool {
        match event.outcome {
            PaymentEventOutcome::Paid => {
                order.payment_reference.as_deref() == Some(event.payment_reference.as_str()) &&
                    order.payment_status == PaymentStatus::Paid
            },
            // Failed payments keep the reference slot free for checkout's next attempt, so the status alone dedups
            PaymentEventOutcome::Failed => order.payment_status == PaymentStatus::Failed,
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
