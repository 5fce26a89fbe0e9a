use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment lifecycle states as the provider reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPaymentStatus {
    Created,
    Captured,
    Failed,
}

/// Refund lifecycle states as the provider reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayRefundStatus {
    Pending,
    Processed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPaymentRequest {
    pub order_id: String,
    /// Decimal string in the provider's wire format, e.g. "499.00"
    pub amount: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRefundRequest {
    pub payment_reference: String,
    /// Decimal string in the provider's wire format, e.g. "499.00"
    pub amount: String,
    pub currency: String,
    pub reason: String,
}

/// A payment as the provider sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRecord {
    pub payment_reference: String,
    pub order_id: String,
    pub amount: String,
    pub currency: String,
    pub status: GatewayPaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// A refund as the provider sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundRecord {
    pub refund_id: String,
    pub payment_reference: String,
    pub amount: String,
    pub currency: String,
    pub status: GatewayRefundStatus,
    pub created_at: DateTime<Utc>,
}

/// Body of a `payment.updated` webhook delivery. The provider redelivers these at least once and in no particular
/// order, so consumers must treat them idempotently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventPayload {
    pub event_id: String,
    pub order_id: String,
    pub payment_reference: String,
    pub status: GatewayPaymentStatus,
    pub amount: String,
    pub currency: String,
}

/// Body of a `refund.updated` webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundEventPayload {
    pub event_id: String,
    pub refund_id: String,
    pub payment_reference: String,
    pub status: GatewayRefundStatus,
}
