//! The adapter between the engine's [`PaymentGateway`] trait and the provider REST client in `gateway_tools`.
//!
//! Besides shuttling calls through, this is where the provider's decimal-string amounts are normalized to integer
//! minor units in the order's declared currency, and where wire statuses are folded into the engine's event types.
//! A currency is never inferred from an amount; the explicit code on the wire has to match the one we asked for.
use gateway_tools::{
    helpers::parse_gateway_amount,
    GatewayApi,
    GatewayApiError,
    GatewayConfig,
    GatewayPaymentStatus,
    GatewayRefundStatus,
    PaymentEventPayload,
    PaymentRecord,
    RefundEventPayload,
    RefundRecord,
};
use sps_common::Money;
use storefront_payment_engine::{
    db_types::{
        GatewayPaymentEvent,
        GatewayRefundEvent,
        OrderId,
        PaymentEventOutcome,
        RefundEventOutcome,
        RefundStatus,
    },
    traits::{GatewayError, GatewayPayment, GatewayRefund, PaymentGateway},
};

use crate::errors::ServerError;

#[derive(Clone)]
pub struct RestPaymentGateway {
    api: GatewayApi,
}

impl RestPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let api = GatewayApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

impl PaymentGateway for RestPaymentGateway {
    async fn create_payment(
        &self,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        let record = self.api.create_payment(order_id.as_str(), amount, currency).await.map_err(convert_err)?;
        payment_from_record(record)
    }

    async fn verify_payment(&self, payment_reference: &str) -> Result<GatewayPayment, GatewayError> {
        let record = self.api.verify_payment(payment_reference).await.map_err(convert_err)?;
        payment_from_record(record)
    }

    async fn create_refund(
        &self,
        payment_reference: &str,
        amount: Money,
        currency: &str,
        reason: &str,
    ) -> Result<GatewayRefund, GatewayError> {
        let record =
            self.api.create_refund(payment_reference, amount, currency, reason).await.map_err(convert_err)?;
        refund_from_record(record)
    }

    async fn verify_refund(&self, refund_id: &str) -> Result<GatewayRefund, GatewayError> {
        let record = self.api.verify_refund(refund_id).await.map_err(convert_err)?;
        refund_from_record(record)
    }
}

fn convert_err(e: GatewayApiError) -> GatewayError {
    match e {
        GatewayApiError::Timeout => GatewayError::Timeout,
        GatewayApiError::QueryError { status, message } if status >= 500 => {
            GatewayError::Upstream { status, message }
        },
        GatewayApiError::QueryError { status, message } => {
            GatewayError::Rejected(format!("Status {status}. {message}"))
        },
        other => GatewayError::Protocol(other.to_string()),
    }
}

fn payment_from_record(record: PaymentRecord) -> Result<GatewayPayment, GatewayError> {
    let amount =
        parse_gateway_amount(&record.amount, &record.currency).map_err(|e| GatewayError::Protocol(e.to_string()))?;
    let outcome = match record.status {
        GatewayPaymentStatus::Created => None,
        GatewayPaymentStatus::Captured => Some(PaymentEventOutcome::Paid),
        GatewayPaymentStatus::Failed => Some(PaymentEventOutcome::Failed),
    };
    Ok(GatewayPayment {
        payment_reference: record.payment_reference,
        order_id: OrderId::from(record.order_id),
        amount,
        currency: record.currency,
        outcome,
    })
}

fn refund_from_record(record: RefundRecord) -> Result<GatewayRefund, GatewayError> {
    let amount =
        parse_gateway_amount(&record.amount, &record.currency).map_err(|e| GatewayError::Protocol(e.to_string()))?;
    let status = match record.status {
        GatewayRefundStatus::Pending => RefundStatus::Pending,
        GatewayRefundStatus::Processed => RefundStatus::Processed,
        GatewayRefundStatus::Failed => RefundStatus::Failed,
    };
    Ok(GatewayRefund {
        refund_id: record.refund_id,
        payment_reference: record.payment_reference,
        amount,
        currency: record.currency,
        status,
    })
}

/// Converts a webhook payment payload into a reconcilable event. `created` deliveries carry no outcome yet and
/// map to `None`; the webhook acknowledges them without touching state.
pub fn payment_event_from_payload(
    payload: PaymentEventPayload,
) -> Result<Option<GatewayPaymentEvent>, ServerError> {
    let outcome = match payload.status {
        GatewayPaymentStatus::Created => return Ok(None),
        GatewayPaymentStatus::Captured => PaymentEventOutcome::Paid,
        GatewayPaymentStatus::Failed => PaymentEventOutcome::Failed,
    };
    let amount = parse_gateway_amount(&payload.amount, &payload.currency)
        .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    Ok(Some(GatewayPaymentEvent {
        event_id: payload.event_id,
        order_id: OrderId::from(payload.order_id),
        payment_reference: payload.payment_reference,
        outcome,
        amount,
        currency: payload.currency,
    }))
}

/// Converts a webhook refund payload into a resolvable event. `pending` deliveries map to `None`.
pub fn refund_event_from_payload(payload: RefundEventPayload) -> Option<GatewayRefundEvent> {
    let outcome = match payload.status {
        GatewayRefundStatus::Pending => return None,
        GatewayRefundStatus::Processed => RefundEventOutcome::Processed,
        GatewayRefundStatus::Failed => RefundEventOutcome::Failed,
    };
    Some(GatewayRefundEvent { event_id: payload.event_id, refund_id: payload.refund_id, outcome })
}
