//! Storefront Payment Engine
//!
//! The reconciliation core of the storefront payment server. It owns order state transitions, matches asynchronous
//! payment-provider events against locally held orders, coordinates refund issuance and resolution, and records an
//! immutable audit trail for every state-changing action. It is provider- and transport-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the database directly;
//!    use the public API instead. The exception is the data types shared with the database layer, which live in
//!    [`mod@db_types`] and are public.
//! 2. The storage and provider traits ([`mod@traits`]). Specific backends (SQLite today, Postgres behind a feature
//!    flag) implement [`traits::OrderStore`] and [`traits::AuditStore`]; the REST client for the external payment
//!    provider is wrapped behind [`traits::PaymentGateway`].
//! 3. The engine public API ([`mod@spe_api`]): the order lifecycle state machine, the payment reconciler, the refund
//!    coordinator, the audit ledger API, and the admin action gateway that fronts them all.
pub mod db_types;
pub mod helpers;
pub mod spe_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use spe_api::{
    admin_api::AdminApi,
    audit_api::AuditApi,
    errors::{OrderLifecycleError, ReconcileError, RefundError},
    lifecycle::OrderLifecycleApi,
    objects,
    reconciler::{PaymentReconciler, ReconcileOutcome},
    refunds::RefundCoordinator,
};
