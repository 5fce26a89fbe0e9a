use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, AuditAction, NewAuditEntry, Order, OrderId, OrderStatus, OrderTransition, PaymentStatus, RefundStatus, RequestMeta},
    spe_api::errors::OrderLifecycleError,
    traits::{AuditStore, OrderPatch, OrderStore},
};

/// `OrderLifecycleApi` is the order state machine: the only component that writes order state.
///
/// Every accepted transition is a single conditional update on the order row (compare-and-swap on the version),
/// followed by an audit entry that embeds the version the mutation produced. Callers are only told "success" once
/// both have happened; if the audit write fails the state change stands, but the caller sees
/// [`OrderLifecycleError::AuditWriteFailed`] and the condition is logged for operator follow-up.
pub struct OrderLifecycleApi<B> {
    db: B,
}

impl<B: Clone> Clone for OrderLifecycleApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> Debug for OrderLifecycleApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLifecycleApi")
    }
}

impl<B> OrderLifecycleApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

/// Validates the requested transition against the tables in the module docs and produces the patch that realizes
/// it. Pure; the version check happens later, at the store.
///
/// | status \ to   | Processing | Shipped | Delivered | Cancelled | Refunded¹ |
/// |---------------|------------|---------|-----------|-----------|-----------|
/// | Pending       | ok         | Err     | Err       | ok        | ok        |
/// | Processing    | Err        | ok      | Err       | ok        | ok        |
/// | Shipped       | Err        | Err     | ok        | Err       | ok        |
/// | Delivered     | Err        | Err     | Err       | Err       | Err       |
/// | Cancelled     | Err        | Err     | Err       | Err       | Err       |
/// | Refunded      | Err        | Err     | Err       | Err       | Err       |
///
/// ¹ only via [`OrderTransition::RefundCompleted`]; a `Fulfillment(Refunded)` request is always rejected.
///
/// Payment transitions: `Pending → Paid`, `Pending | Paid → Failed`, and `Paid → Refunded` (again only through
/// `RefundCompleted`, which retires the fulfillment status in the same write).
pub fn plan_transition(order: &Order, transition: &OrderTransition) -> Result<OrderPatch, OrderLifecycleError> {
    let denied = |from: String, to: String| OrderLifecycleError::InvalidTransition {
        order_id: order.order_id.clone(),
        from,
        to,
    };
    match transition {
        OrderTransition::Fulfillment(target) => {
            use OrderStatus::*;
            let allowed = matches!(
                (order.status, *target),
                (Pending, Processing) | (Processing, Shipped) | (Shipped, Delivered) | (Pending | Processing, Cancelled)
            );
            if !allowed {
                return Err(denied(order.status.to_string(), target.to_string()));
            }
            Ok(OrderPatch::default().with_status(*target))
        },
        OrderTransition::PaymentReceived { payment_reference } => {
            if order.payment_status != PaymentStatus::Pending {
                return Err(denied(order.payment_status.to_string(), PaymentStatus::Paid.to_string()));
            }
            match &order.payment_reference {
                Some(existing) if existing != payment_reference => Err(denied(
                    format!("payment_reference {existing}"),
                    format!("payment_reference {payment_reference}"),
                )),
                Some(_) => Ok(OrderPatch::default().with_payment_status(PaymentStatus::Paid)),
                None => Ok(OrderPatch::default()
                    .with_payment_status(PaymentStatus::Paid)
                    .with_payment_reference(payment_reference.clone())),
            }
        },
        OrderTransition::PaymentFailed => {
            if !matches!(order.payment_status, PaymentStatus::Pending | PaymentStatus::Paid) {
                return Err(denied(order.payment_status.to_string(), PaymentStatus::Failed.to_string()));
            }
            Ok(OrderPatch::default().with_payment_status(PaymentStatus::Failed))
        },
        OrderTransition::RefundCompleted => {
            if order.status.is_terminal() {
                return Err(denied(order.status.to_string(), OrderStatus::Refunded.to_string()));
            }
            if order.payment_status != PaymentStatus::Paid {
                return Err(denied(order.payment_status.to_string(), PaymentStatus::Refunded.to_string()));
            }
            let refund = order
                .refund
                .as_ref()
                .filter(|r| r.status == RefundStatus::Pending)
                .ok_or_else(|| denied("no pending refund".to_string(), OrderStatus::Refunded.to_string()))?;
            let resolved = crate::db_types::Refund {
                status: RefundStatus::Processed,
                resolved_at: Some(chrono::Utc::now()),
                ..refund.clone()
            };
            Ok(OrderPatch::default()
                .with_status(OrderStatus::Refunded)
                .with_payment_status(PaymentStatus::Refunded)
                .with_refund(resolved))
        },
    }
}

fn audit_action_for(transition: &OrderTransition) -> AuditAction {
    match transition {
        OrderTransition::Fulfillment(_) => AuditAction::OrderTransition,
        OrderTransition::PaymentReceived { .. } | OrderTransition::PaymentFailed => AuditAction::PaymentReconciled,
        OrderTransition::RefundCompleted => AuditAction::RefundResolved,
    }
}

impl<B> OrderLifecycleApi<B>
where B: OrderStore + AuditStore
{
    /// Applies `transition` to the order, if and only if the stored version still equals `expected_version`.
    ///
    /// Returns the updated order. Fails with `InvalidTransition` when the target is not reachable from the current
    /// state, with `VersionConflict` when another writer advanced the order first, and with `AuditWriteFailed`
    /// when the state change committed but its ledger entry could not be written.
    pub async fn apply(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        transition: OrderTransition,
        actor: &Actor,
        meta: &RequestMeta,
    ) -> Result<Order, OrderLifecycleError> {
        let order = self
            .db
            .fetch_order(order_id)
            .await
            .map_err(OrderLifecycleError::from)?
            .ok_or_else(|| OrderLifecycleError::OrderNotFound(order_id.clone()))?;
        if order.version != expected_version {
            // A stale read; report it without burning a write.
            return Err(OrderLifecycleError::VersionConflict {
                order_id: order_id.clone(),
                expected: expected_version,
                actual: order.version,
            });
        }
        let patch = plan_transition(&order, &transition)?;
        let updated = self.db.update_order(order_id, expected_version, patch).await?;
        debug!(
            "⚙️ Order {order_id} transitioned [{transition}] by {actor}: v{} -> v{}",
            order.version, updated.version
        );
        let entry = NewAuditEntry::new(actor, audit_action_for(&transition), &order, &updated, meta);
        if let Err(e) = self.db.append_audit_entry(entry).await {
            error!(
                "⚙️🚨 Order {order_id} transition [{transition}] committed at v{}, but the audit entry could not be \
                 written: {e}. The state change stands; reconcile the ledger manually.",
                updated.version
            );
            return Err(OrderLifecycleError::AuditWriteFailed(e.to_string()));
        }
        Ok(updated)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderLifecycleError> {
        self.db.fetch_order(order_id).await.map_err(OrderLifecycleError::from)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use sps_common::Money;

    use super::plan_transition;
    use crate::db_types::{
        Order,
        OrderId,
        OrderStatus,
        OrderTransition,
        PaymentStatus,
        Refund,
        RefundStatus,
    };
    use crate::spe_api::errors::OrderLifecycleError;

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        Order {
            id: 1,
            order_id: OrderId::from("ord-1001"),
            customer_id: "cust-1".to_string(),
            currency: "INR".to_string(),
            total_price: Money::from(50_000),
            status,
            payment_status,
            payment_reference: None,
            refund: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assert_invalid(result: Result<crate::traits::OrderPatch, OrderLifecycleError>) {
        assert!(matches!(result, Err(OrderLifecycleError::InvalidTransition { .. })), "expected InvalidTransition");
    }

    #[test]
    fn happy_path_fulfillment_chain() {
        let o = order(OrderStatus::Pending, PaymentStatus::Paid);
        let patch = plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Processing)).unwrap();
        assert_eq!(patch.status, Some(OrderStatus::Processing));
        let o = order(OrderStatus::Processing, PaymentStatus::Paid);
        assert!(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Shipped)).is_ok());
        let o = order(OrderStatus::Shipped, PaymentStatus::Paid);
        assert!(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Delivered)).is_ok());
    }

    #[test]
    fn no_skipping_and_no_going_back() {
        let o = order(OrderStatus::Pending, PaymentStatus::Paid);
        assert_invalid(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Shipped)));
        let o = order(OrderStatus::Delivered, PaymentStatus::Paid);
        assert_invalid(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Pending)));
        let o = order(OrderStatus::Shipped, PaymentStatus::Paid);
        assert_invalid(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Processing)));
    }

    #[test]
    fn cancellation_only_before_shipping() {
        let o = order(OrderStatus::Pending, PaymentStatus::Pending);
        assert!(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Cancelled)).is_ok());
        let o = order(OrderStatus::Processing, PaymentStatus::Paid);
        assert!(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Cancelled)).is_ok());
        let o = order(OrderStatus::Shipped, PaymentStatus::Paid);
        assert_invalid(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Cancelled)));
        let o = order(OrderStatus::Cancelled, PaymentStatus::Pending);
        assert_invalid(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Processing)));
    }

    #[test]
    fn refunded_is_not_an_admin_target() {
        let o = order(OrderStatus::Processing, PaymentStatus::Paid);
        assert_invalid(plan_transition(&o, &OrderTransition::Fulfillment(OrderStatus::Refunded)));
    }

    #[test]
    fn payment_received_sets_reference_once() {
        let o = order(OrderStatus::Pending, PaymentStatus::Pending);
        let t = OrderTransition::PaymentReceived { payment_reference: "pay_123".to_string() };
        let patch = plan_transition(&o, &t).unwrap();
        assert_eq!(patch.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(patch.payment_reference.as_deref(), Some("pay_123"));

        // Same reference again: status change only, the reference is not rewritten
        let mut o = order(OrderStatus::Pending, PaymentStatus::Pending);
        o.payment_reference = Some("pay_123".to_string());
        let patch = plan_transition(&o, &t).unwrap();
        assert!(patch.payment_reference.is_none());

        // A different reference is rejected outright
        let mut o = order(OrderStatus::Pending, PaymentStatus::Pending);
        o.payment_reference = Some("pay_999".to_string());
        assert_invalid(plan_transition(&o, &t));
    }

    #[test]
    fn payment_terminal_states_reject_further_payment_changes() {
        let o = order(OrderStatus::Pending, PaymentStatus::Paid);
        let t = OrderTransition::PaymentReceived { payment_reference: "pay_123".to_string() };
        assert_invalid(plan_transition(&o, &t));
        let o = order(OrderStatus::Refunded, PaymentStatus::Refunded);
        assert_invalid(plan_transition(&o, &OrderTransition::PaymentFailed));
    }

    #[test]
    fn refund_completion_needs_a_pending_refund_on_a_paid_order() {
        let mut o = order(OrderStatus::Processing, PaymentStatus::Paid);
        assert_invalid(plan_transition(&o, &OrderTransition::RefundCompleted));

        o.refund = Some(Refund {
            refund_id: "rf_1".to_string(),
            amount: Money::from(50_000),
            reason: "damaged".to_string(),
            status: RefundStatus::Pending,
            requested_at: Utc::now(),
            resolved_at: None,
        });
        let patch = plan_transition(&o, &OrderTransition::RefundCompleted).unwrap();
        assert_eq!(patch.status, Some(OrderStatus::Refunded));
        assert_eq!(patch.payment_status, Some(PaymentStatus::Refunded));
        let resolved = patch.refund.unwrap();
        assert_eq!(resolved.status, RefundStatus::Processed);
        assert!(resolved.resolved_at.is_some());

        // Delivered orders keep their goods; money cannot come back through this path
        let mut o = order(OrderStatus::Delivered, PaymentStatus::Paid);
        o.refund = Some(Refund {
            refund_id: "rf_2".to_string(),
            amount: Money::from(100),
            reason: "goodwill".to_string(),
            status: RefundStatus::Pending,
            requested_at: Utc::now(),
            resolved_at: None,
        });
        assert_invalid(plan_transition(&o, &OrderTransition::RefundCompleted));
    }
}
