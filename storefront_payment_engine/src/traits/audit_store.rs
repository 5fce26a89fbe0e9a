use thiserror::Error;

use crate::{
    db_types::{AuditEntry, NewAuditEntry},
    spe_api::objects::AuditQueryFilter,
};

#[derive(Debug, Clone, Error)]
pub enum AuditStoreError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for AuditStoreError {
    fn from(e: sqlx::Error) -> Self {
        AuditStoreError::DatabaseError(e.to_string())
    }
}

/// Append-only storage for the audit ledger. Entries are never updated or deleted, and are read newest-first.
#[allow(async_fn_in_trait)]
pub trait AuditStore: Clone {
    async fn append_audit_entry(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditStoreError>;

    /// Entries matching the filter, in reverse-chronological order.
    async fn search_audit_entries(&self, query: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditStoreError>;
}
