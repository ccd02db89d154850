use async_trait::async_trait;
use modgate_application::AuditLogRepository;
use modgate_core::AppResult;
use modgate_domain::{AuditCursor, AuditFilter, AuditRecord, AuditRecordId, NewAuditRecord};
use tokio::sync::RwLock;

/// In-memory append-only audit log.
#[derive(Debug, Default)]
pub struct InMemoryAuditLogRepository {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditLogRepository {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn append(&self, record: NewAuditRecord) -> AppResult<AuditRecordId> {
        let id = AuditRecordId::generate();
        self.records
            .write()
            .await
            .push(AuditRecord::from_new(id, record));
        Ok(id)
    }

    async fn list_page(
        &self,
        filter: &AuditFilter,
        after: Option<AuditCursor>,
        limit: usize,
    ) -> AppResult<Vec<AuditRecord>> {
        let records = self.records.read().await;
        let mut page: Vec<&AuditRecord> = records
            .iter()
            .filter(|record| filter.matches(record))
            .filter(|record| after.is_none_or(|cursor| cursor.precedes(record)))
            .collect();
        page.sort_unstable_by(|left, right| {
            (right.timestamp, right.id).cmp(&(left.timestamp, left.id))
        });

        Ok(page.into_iter().take(limit).cloned().collect())
    }
}
