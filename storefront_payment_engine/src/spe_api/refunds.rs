use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sps_common::Money;

use crate::{
    db_types::{
        Actor,
        AuditAction,
        NewAuditEntry,
        Order,
        OrderId,
        OrderTransition,
        PaymentStatus,
        Refund,
        RefundEventOutcome,
        RefundStatus,
        RequestMeta,
    },
    helpers::{retry_transient, BackoffPolicy},
    spe_api::{errors::RefundError, lifecycle::OrderLifecycleApi},
    traits::{AuditStore, OrderPatch, OrderStore, PaymentGateway},
};

/// `RefundCoordinator` owns the refund lifecycle: issuing refund requests against the provider, recording the
/// pending sub-record, and resolving the eventual outcome into order state.
pub struct RefundCoordinator<B, G> {
    db: B,
    gateway: G,
    lifecycle: OrderLifecycleApi<B>,
    policy: BackoffPolicy,
}

impl<B: Clone, G: Clone> Clone for RefundCoordinator<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: self.gateway.clone(),
            lifecycle: self.lifecycle.clone(),
            policy: self.policy,
        }
    }
}

impl<B, G> Debug for RefundCoordinator<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundCoordinator")
    }
}

impl<B: Clone, G> RefundCoordinator<B, G> {
    pub fn new(db: B, gateway: G, policy: BackoffPolicy) -> Self {
        Self { lifecycle: OrderLifecycleApi::new(db.clone()), db, gateway, policy }
    }
}

impl<B, G> RefundCoordinator<B, G>
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    /// Issues a refund for the order and records the pending sub-record.
    ///
    /// Preconditions: the order is paid, not in a terminal fulfillment state, carries no outstanding (non-failed)
    /// refund, and the amount does not exceed the order total. Amounts are compared as raw minor units in the
    /// order's own currency; nothing here ever guesses a currency from the size of a number.
    ///
    /// The provider call happens first and strictly outside any store transaction; transient provider errors are
    /// retried with bounded backoff. When the budget is exhausted, `DispatchFailed` is surfaced and it takes an
    /// explicit new `initiate_refund` call to try again. There is no background retry.
    pub async fn initiate_refund(
        &self,
        order_id: &OrderId,
        amount: Money,
        reason: &str,
        actor: &Actor,
        meta: &RequestMeta,
    ) -> Result<Order, RefundError> {
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| RefundError::OrderNotFound(order_id.clone()))?;
        if order.payment_status != PaymentStatus::Paid {
            return Err(RefundError::InvalidState(format!(
                "order {order_id} has payment status {}, only paid orders can be refunded",
                order.payment_status
            )));
        }
        if order.status.is_terminal() {
            return Err(RefundError::InvalidState(format!(
                "order {order_id} is already {} and cannot be refunded",
                order.status
            )));
        }
        if let Some(existing) = &order.refund {
            if existing.status != RefundStatus::Failed {
                return Err(RefundError::InvalidState(format!(
                    "order {order_id} already has refund {} in status {}",
                    existing.refund_id, existing.status
                )));
            }
        }
        if amount.value() <= 0 || amount > order.total_price {
            return Err(RefundError::InvalidAmount { requested: amount, total: order.total_price });
        }
        // Paid orders always carry a reference; guard anyway so a data problem fails loudly instead of panicking
        let reference = order.payment_reference.clone().ok_or_else(|| {
            RefundError::InvalidState(format!("order {order_id} is paid but has no payment reference"))
        })?;

        let dispatched = retry_transient(
            &self.policy,
            || self.gateway.create_refund(&reference, amount, &order.currency, reason),
            |e| e.is_transient(),
            "create_refund",
        )
        .await
        .map_err(|e| {
            warn!("↩️ Refund dispatch for order {order_id} failed after {} attempt(s): {}", e.attempts, e.error);
            RefundError::DispatchFailed { attempts: e.attempts, last_error: e.error.to_string() }
        })?;
        info!("↩️ Provider accepted refund {} for order {order_id}", dispatched.refund_id);

        let refund = Refund {
            refund_id: dispatched.refund_id.clone(),
            amount,
            reason: reason.to_string(),
            status: RefundStatus::Pending,
            requested_at: Utc::now(),
            resolved_at: None,
        };
        let patch = OrderPatch::default().with_refund(refund);
        let updated = self.db.update_order(order_id, order.version, patch).await.map_err(|e| {
            // The provider has the refund but we could not record it. Leave a loud trail for the operator; the
            // admin must re-fetch and retry, and the provider-side duplicate guard is the refund_id itself.
            error!(
                "↩️🚨 Refund {} was created at the provider but could not be recorded on order {order_id}: {e}",
                dispatched.refund_id
            );
            RefundError::from(e)
        })?;
        let entry = NewAuditEntry::new(actor, AuditAction::RefundInitiated, &order, &updated, meta);
        if let Err(e) = self.db.append_audit_entry(entry).await {
            error!(
                "↩️🚨 Refund {} recorded on order {order_id} at v{}, but the audit entry could not be written: {e}",
                dispatched.refund_id, updated.version
            );
            return Err(crate::spe_api::errors::OrderLifecycleError::AuditWriteFailed(e.to_string()).into());
        }
        Ok(updated)
    }

    /// Resolves a pending refund from a provider notification (webhook or poll).
    ///
    /// `Processed` drives the state machine to the terminal refunded state; `Failed` marks the sub-record failed
    /// and leaves the order's fulfillment status untouched, which is what re-opens the door for a fresh
    /// `initiate_refund`. Resolving an already-resolved refund with the same outcome is an idempotent no-op.
    pub async fn resolve_refund(
        &self,
        refund_id: &str,
        outcome: RefundEventOutcome,
        actor: &Actor,
        meta: &RequestMeta,
    ) -> Result<Order, RefundError> {
        let order = self
            .db
            .fetch_order_by_refund_id(refund_id)
            .await?
            .ok_or_else(|| RefundError::UnknownRefund(refund_id.to_string()))?;
        let refund = order.refund.clone().ok_or_else(|| RefundError::UnknownRefund(refund_id.to_string()))?;
        match (refund.status, outcome) {
            (RefundStatus::Processed, RefundEventOutcome::Processed) |
            (RefundStatus::Failed, RefundEventOutcome::Failed) => {
                debug!("↩️ Refund {refund_id} already resolved as {outcome}. No-op.");
                Ok(order)
            },
            (RefundStatus::Processed, RefundEventOutcome::Failed) |
            (RefundStatus::Failed, RefundEventOutcome::Processed) => Err(RefundError::InvalidState(format!(
                "refund {refund_id} was already resolved as {}, refusing to flip it to {outcome}",
                refund.status
            ))),
            (RefundStatus::Pending, RefundEventOutcome::Processed) => {
                let updated = self
                    .lifecycle
                    .apply(&order.order_id, order.version, OrderTransition::RefundCompleted, actor, meta)
                    .await?;
                info!("↩️ Refund {refund_id} processed; order {} is now refunded", updated.order_id);
                Ok(updated)
            },
            (RefundStatus::Pending, RefundEventOutcome::Failed) => {
                let failed = Refund { status: RefundStatus::Failed, resolved_at: Some(Utc::now()), ..refund };
                let patch = OrderPatch::default().with_refund(failed);
                let updated = self.db.update_order(&order.order_id, order.version, patch).await?;
                info!(
                    "↩️ Refund {refund_id} failed at the provider; order {} is unchanged and refundable again",
                    updated.order_id
                );
                let entry = NewAuditEntry::new(actor, AuditAction::RefundResolved, &order, &updated, meta);
                if let Err(e) = self.db.append_audit_entry(entry).await {
                    error!("↩️🚨 Refund {refund_id} marked failed at v{}, but the audit entry could not be written: {e}", updated.version);
                    return Err(crate::spe_api::errors::OrderLifecycleError::AuditWriteFailed(e.to_string()).into());
                }
                Ok(updated)
            },
        }
    }

    /// The poll half of the provider's notification channel: asks the provider for the refund's current status and
    /// resolves it if it reached a terminal state. Transient provider errors bubble up as-is; the sweep simply
    /// tries again on its next pass.
    pub async fn poll_refund(&self, refund_id: &str, actor: &Actor) -> Result<Option<Order>, RefundError> {
        let status = retry_transient(
            &self.policy,
            || self.gateway.verify_refund(refund_id),
            |e| e.is_transient(),
            "verify_refund",
        )
        .await
        .map_err(|e| {
            warn!("↩️ Could not resolve refund {refund_id} with the provider after {} attempt(s): {}", e.attempts, e.error);
            RefundError::DispatchFailed { attempts: e.attempts, last_error: e.error.to_string() }
        })?;
        let outcome = match status.status {
            RefundStatus::Pending => return Ok(None),
            RefundStatus::Processed => RefundEventOutcome::Processed,
            RefundStatus::Failed => RefundEventOutcome::Failed,
        };
        self.resolve_refund(refund_id, outcome, actor, &RequestMeta::default()).await.map(Some)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
