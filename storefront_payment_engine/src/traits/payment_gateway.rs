use sps_common::Money;
use thiserror::Error;

use crate::db_types::{OrderId, PaymentEventOutcome, RefundStatus};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment provider did not respond within the configured deadline")]
    Timeout,
    #[error("The payment provider returned an error. Status {status}. {message}")]
    Upstream { status: u16, message: String },
    #[error("The payment provider rejected the request. {0}")]
    Rejected(String),
    #[error("Unintelligible response from the payment provider. {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Timeouts and provider-side failures are worth retrying with backoff. A timeout in particular means the
    /// operation is *unresolved*, not failed: the request may well have landed, so retries must go through
    /// idempotent verify/query paths. Rejections and garbled responses are definitive.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout => true,
            GatewayError::Upstream { status, .. } => *status >= 500,
            GatewayError::Rejected(_) | GatewayError::Protocol(_) => false,
        }
    }
}

/// The provider's view of a payment, normalized to minor units in the order's declared currency.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub payment_reference: String,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    /// `None` while the provider still has the payment in flight.
    pub outcome: Option<PaymentEventOutcome>,
}

/// The provider's view of a refund, normalized to minor units in the order's declared currency.
#[derive(Debug, Clone)]
pub struct GatewayRefund {
    pub refund_id: String,
    pub payment_reference: String,
    pub amount: Money,
    pub currency: String,
    pub status: RefundStatus,
}

/// The narrow interface the engine uses to talk to the external payment provider.
///
/// Implementations normalize all amounts to integer minor units in the single currency declared on the order, and
/// must never derive a currency from the magnitude of a number. Every call is bounded by a timeout; none of these
/// calls may be made while a store transaction is open.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    async fn create_payment(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<GatewayPayment, GatewayError>;

    /// Idempotent query for the provider's current view of a payment. Safe to call any number of times, which is
    /// what makes timed-out operations recoverable.
    async fn verify_payment(&self, payment_reference: &str) -> Result<GatewayPayment, GatewayError>;

    async fn create_refund(
        &self,
        payment_reference: &str,
        amount: Money,
        currency: &str,
        reason: &str,
    ) -> Result<GatewayRefund, GatewayError>;

    /// Idempotent query for the provider's current view of a refund.
    async fn verify_refund(&self, refund_id: &str) -> Result<GatewayRefund, GatewayError>;
}
