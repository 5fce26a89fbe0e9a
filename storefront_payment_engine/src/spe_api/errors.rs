use sps_common::Money;
use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{AuditStoreError, OrderStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderLifecycleError {
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invalid transition for order {order_id}: {from} -> {to}")]
    InvalidTransition { order_id: OrderId, from: String, to: String },
    #[error("Order {order_id} was modified concurrently: expected version {expected}, found {actual}")]
    VersionConflict { order_id: OrderId, expected: i64, actual: i64 },
    #[error("The state change committed, but writing its audit entry failed: {0}")]
    AuditWriteFailed(String),
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<OrderStoreError> for OrderLifecycleError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => OrderLifecycleError::OrderNotFound(id),
            OrderStoreError::VersionConflict { order_id, expected, actual } => {
                OrderLifecycleError::VersionConflict { order_id, expected, actual }
            },
            other => OrderLifecycleError::StorageError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("No order matches correlation id {0}")]
    UnknownOrder(OrderId),
    #[error("Event {event_id} does not match order {order_id}: the stored amount or currency differs")]
    AmountMismatch { event_id: String, order_id: OrderId },
    #[error("Event {event_id} conflicts with concurrent changes to order {order_id}. Manual review required.")]
    ReconciliationConflict { event_id: String, order_id: OrderId },
    #[error("The payment for order {0} could not be resolved with the provider. It will be retried.")]
    Unresolved(OrderId),
    #[error(transparent)]
    Lifecycle(#[from] OrderLifecycleError),
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<OrderStoreError> for ReconcileError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => ReconcileError::UnknownOrder(id),
            other => ReconcileError::StorageError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RefundError {
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No refund with id {0} is known")]
    UnknownRefund(String),
    #[error("Refund not permitted: {0}")]
    InvalidState(String),
    #[error("Refund of {requested} exceeds the order total of {total} (both in the order's own currency)")]
    InvalidAmount { requested: Money, total: Money },
    #[error("Could not dispatch the refund to the provider after {attempts} attempt(s). {last_error}")]
    DispatchFailed { attempts: u32, last_error: String },
    #[error("Another update raced this refund on order {order_id}. Fetch the order and retry.")]
    Conflict { order_id: OrderId },
    #[error(transparent)]
    Lifecycle(#[from] OrderLifecycleError),
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<OrderStoreError> for RefundError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => RefundError::OrderNotFound(id),
            OrderStoreError::VersionConflict { order_id, .. } => RefundError::Conflict { order_id },
            other => RefundError::StorageError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuditApiError {
    /// The triggering mutation must be treated as not-fully-committed from a compliance standpoint when this
    /// surfaces; the mutation itself is not rolled back.
    #[error("Audit write failed: {0}")]
    WriteFailed(String),
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<AuditStoreError> for AuditApiError {
    fn from(e: AuditStoreError) -> Self {
        AuditApiError::WriteFailed(e.to_string())
    }
}
