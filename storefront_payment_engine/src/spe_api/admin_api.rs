use std::fmt::Debug;

use log::*;
use sps_common::Money;

use crate::{
    db_types::{Actor, AuditEntry, Order, OrderId, OrderStatus, OrderTransition, RequestMeta},
    spe_api::{
        audit_api::AuditApi,
        errors::{AuditApiError, OrderLifecycleError, RefundError},
        lifecycle::OrderLifecycleApi,
        objects::{AuditQueryFilter, FullOrder, OrderQueryFilter},
        refunds::RefundCoordinator,
    },
    traits::{AuditStore, OrderStore, PaymentGateway},
};

/// `AdminApi` is the single entry point through which administrative reads and mutations reach the engine.
///
/// Every mutation demands an authenticated [`Actor`] (resolved upstream by the auth collaborator) and mirrors its
/// effect into the audit ledger via the underlying APIs. Nothing here mutates state directly; it all funnels
/// through the state machine and the refund coordinator.
pub struct AdminApi<B, G> {
    db: B,
    lifecycle: OrderLifecycleApi<B>,
    refunds: RefundCoordinator<B, G>,
    audit: AuditApi<B>,
}

impl<B: Clone, G: Clone> Clone for AdminApi<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            lifecycle: self.lifecycle.clone(),
            refunds: self.refunds.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<B, G> Debug for AdminApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdminApi")
    }
}

impl<B: Clone, G: Clone> AdminApi<B, G> {
    pub fn new(db: B, refunds: RefundCoordinator<B, G>) -> Self {
        Self { lifecycle: OrderLifecycleApi::new(db.clone()), audit: AuditApi::new(db.clone()), db, refunds }
    }
}

impl<B, G> AdminApi<B, G>
where
    B: OrderStore + AuditStore,
    G: PaymentGateway,
{
    pub async fn list_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderLifecycleError> {
        let orders = self.db.search_orders(query).await?;
        trace!("🛂 Admin order search returned {} orders", orders.len());
        Ok(orders)
    }

    pub async fn get_order(&self, order_id: &OrderId) -> Result<Option<FullOrder>, OrderLifecycleError> {
        let order = match self.db.fetch_order(order_id).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let items = self.db.fetch_order_items(order_id).await?;
        Ok(Some(FullOrder { order, items }))
    }

    /// Applies an administrative fulfillment transition. `expected_version` is the version the console read before
    /// the admin hit the button; a mismatch means someone else changed the order and the console should re-fetch.
    pub async fn transition_order(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        target: OrderStatus,
        actor: &Actor,
        meta: &RequestMeta,
    ) -> Result<Order, OrderLifecycleError> {
        debug!("🛂 {actor} requests order {order_id} -> {target} (from v{expected_version})");
        self.lifecycle.apply(order_id, expected_version, OrderTransition::Fulfillment(target), actor, meta).await
    }

    pub async fn initiate_refund(
        &self,
        order_id: &OrderId,
        amount: Money,
        reason: &str,
        actor: &Actor,
        meta: &RequestMeta,
    ) -> Result<Order, RefundError> {
        debug!("🛂 {actor} requests a refund of {amount} on order {order_id}: {reason}");
        self.refunds.initiate_refund(order_id, amount, reason, actor, meta).await
    }

    pub async fn list_audit_entries(&self, query: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditApiError> {
        self.audit.search(query).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
