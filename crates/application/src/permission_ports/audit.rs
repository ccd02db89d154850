use async_trait::async_trait;
use modgate_core::AppResult;
use modgate_domain::{AuditCursor, AuditFilter, AuditRecord, AuditRecordId, NewAuditRecord};

/// Append-only audit store.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Appends one record and returns its id. Storage failures are returned,
    /// never swallowed.
    async fn append(&self, record: NewAuditRecord) -> AppResult<AuditRecordId>;

    /// Returns up to `limit` matching records ordered by
    /// `(timestamp DESC, id DESC)`, starting strictly after `after`.
    async fn list_page(
        &self,
        filter: &AuditFilter,
        after: Option<AuditCursor>,
        limit: usize,
    ) -> AppResult<Vec<AuditRecord>>;
}
