use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{AuditEntry, NewAuditEntry},
    spe_api::{errors::AuditApiError, objects::AuditQueryFilter},
    traits::AuditStore,
};

/// `AuditApi` fronts the append-only audit ledger.
///
/// `record` never fails silently: a failed write surfaces to the caller as [`AuditApiError::WriteFailed`] even when
/// the state mutation it documents already committed, because an unrecorded mutation is a compliance problem that a
/// human has to chase, not a detail to swallow.
pub struct AuditApi<B> {
    db: B,
}

impl<B: Clone> Clone for AuditApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> Debug for AuditApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuditApi")
    }
}

impl<B> AuditApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AuditApi<B>
where B: AuditStore
{
    pub async fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, AuditApiError> {
        self.db.append_audit_entry(entry).await.map_err(|e| {
            error!("🧾🚨 Could not append audit entry: {e}");
            AuditApiError::from(e)
        })
    }

    /// Entries matching the filter, newest first. Entries are immutable; there is no update or delete.
    pub async fn search(&self, query: AuditQueryFilter) -> Result<Vec<AuditEntry>, AuditApiError> {
        let entries = self.db.search_audit_entries(query).await.map_err(|e| AuditApiError::StorageError(e.to_string()))?;
        trace!("🧾 Audit search returned {} entries", entries.len());
        Ok(entries)
    }
}
