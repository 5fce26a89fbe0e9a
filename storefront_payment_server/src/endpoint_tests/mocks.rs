use std::sync::Arc;

use mockall::mock;
use sps_common::Money;
use storefront_payment_engine::{
    db_types::{AuditEntry, LineItem, NewAuditEntry, NewOrder, Order, OrderId},
    spe_api::objects::{AuditQueryFilter, OrderQueryFilter},
    traits::{
        AuditStore,
        AuditStoreError,
        GatewayError,
        GatewayPayment,
        GatewayRefund,
        OrderPatch,
        OrderStore,
        OrderStoreError,
        PaymentGateway,
    },
};

// The storage and gateway traits carry a Clone supertrait so the engine APIs can share a backend. Mock the methods
// as inherent ones and put the trait impls on an Arc-backed wrapper instead: every clone then sees the same
// expectation set.
mock! {
    pub Backend {
        pub async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError>;
        pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;
        pub async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, OrderStoreError>;
        pub async fn fetch_order_by_refund_id(&self, refund_id: &str) -> Result<Option<Order>, OrderStoreError>;
        pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError>;
        pub async fn update_order(&self, order_id: &OrderId, expected_version: i64, patch: OrderPatch) -> Result<Order, OrderStoreError>;
        pub async fn append_audit_entry(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditStoreError>;
        pub async fn search_audit_entries(&self, query: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditStoreError>;
    }
}

mock! {
    pub Gateway {
        pub async fn create_payment(&self, order_id: &OrderId, amount: Money, currency: &str) -> Result<GatewayPayment, GatewayError>;
        pub async fn verify_payment(&self, payment_reference: &str) -> Result<GatewayPayment, GatewayError>;
        pub async fn create_refund(&self, payment_reference: &str, amount: Money, currency: &str, reason: &str) -> Result<GatewayRefund, GatewayError>;
        pub async fn verify_refund(&self, refund_id: &str) -> Result<GatewayRefund, GatewayError>;
    }
}

#[derive(Clone)]
pub struct SharedBackend(pub Arc<MockBackend>);

impl SharedBackend {
    pub fn new(mock: MockBackend) -> Self {
        Self(Arc::new(mock))
    }
}

impl OrderStore for SharedBackend {
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError> {
        self.0.insert_order(order).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        self.0.fetch_order(order_id).await
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, OrderStoreError> {
        self.0.fetch_order_items(order_id).await
    }

    async fn fetch_order_by_refund_id(&self, refund_id: &str) -> Result<Option<Order>, OrderStoreError> {
        self.0.fetch_order_by_refund_id(refund_id).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError> {
        self.0.search_orders(query).await
    }

    async fn update_order(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        patch: OrderPatch,
    ) -> Result<Order, OrderStoreError> {
        self.0.update_order(order_id, expected_version, patch).await
    }
}

impl AuditStore for SharedBackend {
    async fn append_audit_entry(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditStoreError> {
        self.0.append_audit_entry(entry).await
    }

    async fn search_audit_entries(&self, query: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditStoreError> {
        self.0.search_audit_entries(query).await
    }
}

#[derive(Clone)]
pub struct SharedGateway(pub Arc<MockGateway>);

impl SharedGateway {
    pub fn new(mock: MockGateway) -> Self {
        Self(Arc::new(mock))
    }
}

impl PaymentGateway for SharedGateway {
    async fn create_payment(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        self.0.create_payment(order_id, amount, currency).await
    }

    async fn verify_payment(&self, payment_reference: &str) -> Result<GatewayPayment, GatewayError> {
        self.0.verify_payment(payment_reference).await
    }

    async fn create_refund(
        &self,
        payment_reference: &str,
        amount: Money,
        currency: &str,
        reason: &str,
    ) -> Result<GatewayRefund, GatewayError> {
        self.0.create_refund(payment_reference, amount, currency, reason).await
    }

    async fn verify_refund(&self, refund_id: &str) -> Result<GatewayRefund, GatewayError> {
        self.0.verify_refund(refund_id).await
    }
}
