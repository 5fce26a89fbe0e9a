use thiserror::Error;

use crate::{
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatus, PaymentStatus, Refund},
    spe_api::objects::OrderQueryFilter,
};

/// The set of fields a single accepted mutation may change on an order row.
///
/// A patch is applied through [`OrderStore::update_order`] and nowhere else; the version check there is what makes
/// concurrent writers safe. Fields that are `None` are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Only valid when the order has no reference yet; references are write-once.
    pub payment_reference: Option<String>,
    /// Replaces the refund sub-record wholesale.
    pub refund: Option<Refund>,
}

impl OrderPatch {
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn with_payment_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    pub fn with_refund(mut self, refund: Refund) -> Self {
        self.refund = Some(refund);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() &&
            self.payment_status.is_none() &&
            self.payment_reference.is_none() &&
            self.refund.is_none()
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} was modified concurrently: expected version {expected}, found {actual}")]
    VersionConflict { order_id: OrderId, expected: i64, actual: i64 },
    #[error("Rejecting order: {0}")]
    InvalidOrder(String),
    #[error("The requested order change would result in a no-op.")]
    EmptyUpdate,
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

/// Typed access to order rows, with the compare-and-swap update primitive as the only way to mutate them.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Clone {
    /// Stores a new order and its line items atomically, after checking the order's internal invariants.
    /// This call is idempotent: re-submitting an existing `order_id` returns the stored order and `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    /// The immutable line items belonging to an order.
    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, OrderStoreError>;

    /// Finds the order carrying the given provider-issued refund id, if any.
    async fn fetch_order_by_refund_id(&self, refund_id: &str) -> Result<Option<Order>, OrderStoreError>;

    /// Fetches orders according to the criteria in the filter, ordered by creation time, newest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError>;

    /// Applies `patch` to the order if and only if its stored version still equals `expected_version`, incrementing
    /// the version in the same statement. Never a blind overwrite. Returns the updated row, or
    /// [`OrderStoreError::VersionConflict`] when another writer got there first.
    async fn update_order(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        patch: OrderPatch,
    ) -> Result<Order, OrderStoreError>;
}
