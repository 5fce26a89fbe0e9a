use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sps_common::Money;
use sqlx::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      OrderStatus       ------------------------------------------------------
/// Fulfillment status of an order.
///
/// `Pending → Processing → Shipped → Delivered` is the happy path. `Pending` and `Processing` orders can be
/// cancelled. `Refunded` is reachable from any non-terminal status, but only through the refund coordinator.
/// `Delivered`, `Cancelled` and `Refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Processing => write!(f, "Processing"),
            OrderStatus::Shipped => write!(f, "Shipped"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
            OrderStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatus::Pending
        })
    }
}

//--------------------------------------     PaymentStatus      ------------------------------------------------------
/// Payment status of an order. `Pending → Paid`, `Paid → Refunded`, and `Pending | Paid → Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

//--------------------------------------     RefundStatus       ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RefundStatus {
    Pending,
    Processed,
    Failed,
}

impl Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundStatus::Pending => write!(f, "Pending"),
            RefundStatus::Processed => write!(f, "Processed"),
            RefundStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for RefundStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processed" => Ok(Self::Processed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid refund status: {s}"))),
        }
    }
}

//--------------------------------------        Refund         -------------------------------------------------------
/// The refund sub-record carried on an order. At most one non-failed refund exists at a time; a `Failed` refund
/// stays on the record until a fresh attempt supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    /// Identifier issued by the payment provider when the refund was created.
    pub refund_id: String,
    /// Amount in minor units, denominated in the order's own currency.
    pub amount: Money,
    pub reason: String,
    pub status: RefundStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

//--------------------------------------        LineItem        ------------------------------------------------------
/// A product line on an order. Immutable once the order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LineItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

//--------------------------------------         Order          ------------------------------------------------------
/// An order row as held by the store. Line items live in their own table and are fetched separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    /// Uppercase ISO-4217 code, fixed at creation. Amounts on this order are only ever interpreted in this currency.
    pub currency: String,
    pub total_price: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Provider-issued payment id. Set at most once, never cleared.
    pub payment_reference: Option<String>,
    pub refund: Option<Refund>,
    /// Monotonic version, starts at 1 and increments on every accepted mutation.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// JSON snapshot of the mutable portion of the order, as recorded in audit entries.
    pub fn state_snapshot(&self) -> serde_json::Value {
        json!({
            "status": self.status,
            "payment_status": self.payment_status,
            "payment_reference": self.payment_reference,
            "refund": self.refund,
            "version": self.version,
        })
    }
}

//--------------------------------------        NewOrder        ------------------------------------------------------
/// A new order as handed over by the checkout flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    /// The order id assigned by the storefront
    pub order_id: OrderId,
    /// The customer id assigned by the storefront
    pub customer_id: String,
    /// Uppercase ISO-4217 currency code for every amount on this order
    pub currency: String,
    /// The total price in minor units. Must equal the sum of the line totals.
    pub total_price: Money,
    /// Provider payment id, if checkout already created the payment
    pub payment_reference: Option<String>,
    pub items: Vec<NewLineItem>,
    /// The time the order was created on the storefront
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, customer_id: String, currency: String, items: Vec<NewLineItem>) -> Self {
        let total_price = items.iter().map(|i| i.line_total).sum();
        Self { order_id, customer_id, currency, total_price, payment_reference: None, items, created_at: Utc::now() }
    }

    pub fn with_payment_reference(mut self, reference: String) -> Self {
        self.payment_reference = Some(reference);
        self
    }

    /// Checks the order's internal invariants: a sane currency code, non-negative amounts, per-line totals that
    /// match `quantity * unit_price`, and an order total equal to the sum of the line totals.
    pub fn validate(&self) -> Result<(), ConversionError> {
        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ConversionError(format!("Invalid currency code: {}", self.currency)));
        }
        if self.total_price.is_negative() {
            return Err(ConversionError(format!("Negative order total: {}", self.total_price)));
        }
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(ConversionError(format!("Invalid quantity for product {}", item.product_id)));
            }
            if item.unit_price * item.quantity != item.line_total {
                return Err(ConversionError(format!("Line total mismatch for product {}", item.product_id)));
            }
        }
        let line_sum: Money = self.items.iter().map(|i| i.line_total).sum();
        if line_sum != self.total_price {
            return Err(ConversionError(format!(
                "Order total {} does not equal the sum of line totals {line_sum}",
                self.total_price
            )));
        }
        Ok(())
    }
}

//--------------------------------------     OrderTransition     -----------------------------------------------------
/// A requested change to an order's lifecycle state.
///
/// `Fulfillment` carries the admin-visible targets. The payment variants are produced by the reconciler from
/// provider events. `RefundCompleted` is only ever constructed by the refund coordinator; requesting `Refunded`
/// through the fulfillment path is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTransition {
    Fulfillment(OrderStatus),
    PaymentReceived { payment_reference: String },
    PaymentFailed,
    RefundCompleted,
}

impl Display for OrderTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderTransition::Fulfillment(target) => write!(f, "fulfillment -> {target}"),
            OrderTransition::PaymentReceived { payment_reference } => {
                write!(f, "payment received [{payment_reference}]")
            },
            OrderTransition::PaymentFailed => write!(f, "payment failed"),
            OrderTransition::RefundCompleted => write!(f, "refund completed"),
        }
    }
}

//--------------------------------------         Actor          ------------------------------------------------------
/// Access roles for the admin surface. Assigned by the (external) auth collaborator and propagated per-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    ReadAll,
    Write,
    SuperAdmin,
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read_all" => Ok(Self::ReadAll),
            "write" => Ok(Self::Write),
            "super_admin" => Ok(Self::SuperAdmin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

/// The identity a state-changing action is attributed to in the audit ledger. Either an administrator (resolved by
/// the auth collaborator) or one of the well-known system actors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn admin<S: Into<String>>(id: S, roles: Vec<Role>) -> Self {
        Self { id: id.into(), roles }
    }

    /// A non-human actor, e.g. the webhook ingester or the reconciliation poller.
    pub fn system<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), roles: vec![Role::Write] }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

//--------------------------------------      AuditAction       ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    OrderTransition,
    PaymentReconciled,
    RefundInitiated,
    RefundResolved,
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::OrderTransition => write!(f, "OrderTransition"),
            AuditAction::PaymentReconciled => write!(f, "PaymentReconciled"),
            AuditAction::RefundInitiated => write!(f, "RefundInitiated"),
            AuditAction::RefundResolved => write!(f, "RefundResolved"),
        }
    }
}

impl FromStr for AuditAction {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OrderTransition" => Ok(Self::OrderTransition),
            "PaymentReconciled" => Ok(Self::PaymentReconciled),
            "RefundInitiated" => Ok(Self::RefundInitiated),
            "RefundResolved" => Ok(Self::RefundResolved),
            s => Err(ConversionError(format!("Invalid audit action: {s}"))),
        }
    }
}

//--------------------------------------      AuditEntry        ------------------------------------------------------
/// One immutable line in the audit ledger. Entries are only ever appended, and are written with the order version
/// their mutation produced so that ledger and order history can be correlated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub actor_id: String,
    pub action: AuditAction,
    pub order_id: OrderId,
    pub prior_state: serde_json::Value,
    pub new_state: serde_json::Value,
    pub order_version: i64,
    pub remote_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub actor_id: String,
    pub action: AuditAction,
    pub order_id: OrderId,
    pub prior_state: serde_json::Value,
    pub new_state: serde_json::Value,
    pub order_version: i64,
    pub remote_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl NewAuditEntry {
    pub fn new(actor: &Actor, action: AuditAction, before: &Order, after: &Order, meta: &RequestMeta) -> Self {
        Self {
            actor_id: actor.id.clone(),
            action,
            order_id: after.order_id.clone(),
            prior_state: before.state_snapshot(),
            new_state: after.state_snapshot(),
            order_version: after.version,
            remote_ip: meta.remote_ip.clone(),
            user_agent: meta.user_agent.clone(),
        }
    }
}

/// Request metadata captured for the audit trail. Empty for system-initiated actions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    pub remote_ip: Option<String>,
    pub user_agent: Option<String>,
}

//--------------------------------------    Gateway events      ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEventOutcome {
    Paid,
    Failed,
}

impl Display for PaymentEventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentEventOutcome::Paid => write!(f, "paid"),
            PaymentEventOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// A payment confirmation as delivered by the provider (webhook or poll). Delivery is at-least-once and unordered;
/// the reconciler applies each event's effect at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentEvent {
    pub event_id: String,
    pub order_id: OrderId,
    pub payment_reference: String,
    pub outcome: PaymentEventOutcome,
    pub amount: Money,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundEventOutcome {
    Processed,
    Failed,
}

impl Display for RefundEventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundEventOutcome::Processed => write!(f, "processed"),
            RefundEventOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// A refund resolution as delivered by the provider (webhook or poll).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefundEvent {
    pub event_id: String,
    pub refund_id: String,
    pub outcome: RefundEventOutcome,
}

//--------------------------------------    Row conversions     ------------------------------------------------------
#[cfg(feature = "sqlite")]
mod sqlite_rows {
    use sqlx::{sqlite::SqliteRow, FromRow, Row};

    use super::*;

    fn decode_err(index: &str, e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
        sqlx::Error::ColumnDecode { index: index.to_string(), source: Box::new(e) }
    }

    impl FromRow<'_, SqliteRow> for Order {
        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            let status = row
                .try_get::<String, _>("status")?
                .parse::<OrderStatus>()
                .map_err(|e| decode_err("status", e))?;
            let payment_status = row
                .try_get::<String, _>("payment_status")?
                .parse::<PaymentStatus>()
                .map_err(|e| decode_err("payment_status", e))?;
            let refund = match row.try_get::<Option<String>, _>("refund_id")? {
                None => None,
                Some(refund_id) => Some(Refund {
                    refund_id,
                    amount: row.try_get("refund_amount")?,
                    reason: row.try_get("refund_reason")?,
                    status: row
                        .try_get::<String, _>("refund_status")?
                        .parse::<RefundStatus>()
                        .map_err(|e| decode_err("refund_status", e))?,
                    requested_at: row.try_get("refund_requested_at")?,
                    resolved_at: row.try_get("refund_resolved_at")?,
                }),
            };
            Ok(Order {
                id: row.try_get("id")?,
                order_id: row.try_get("order_id")?,
                customer_id: row.try_get("customer_id")?,
                currency: row.try_get("currency")?,
                total_price: row.try_get("total_price")?,
                status,
                payment_status,
                payment_reference: row.try_get("payment_reference")?,
                refund,
                version: row.try_get("version")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        }
    }

    impl FromRow<'_, SqliteRow> for AuditEntry {
        fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
            let action = row
                .try_get::<String, _>("action")?
                .parse::<AuditAction>()
                .map_err(|e| decode_err("action", e))?;
            let prior_state = serde_json::from_str(&row.try_get::<String, _>("prior_state")?)
                .map_err(|e| decode_err("prior_state", e))?;
            let new_state = serde_json::from_str(&row.try_get::<String, _>("new_state")?)
                .map_err(|e| decode_err("new_state", e))?;
            Ok(AuditEntry {
                id: row.try_get("id")?,
                actor_id: row.try_get("actor_id")?,
                action,
                order_id: row.try_get("order_id")?,
                prior_state,
                new_state,
                order_version: row.try_get("order_version")?,
                remote_ip: row.try_get("remote_ip")?,
                user_agent: row.try_get("user_agent")?,
                created_at: row.try_get("created_at")?,
            })
        }
    }
}
