use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sps_common::Money;
use storefront_payment_engine::db_types::OrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of `POST /api/orders/{order_id}/transition`. `expected_version` is the version the console read before the
/// admin confirmed the change; the engine rejects the request if the order has moved on since.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOrderParams {
    pub expected_version: i64,
    pub target: OrderStatus,
}

/// Body of `POST /api/orders/{order_id}/refund`. The amount is in minor units in the order's own currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundParams {
    pub amount: Money,
    pub reason: String,
}
