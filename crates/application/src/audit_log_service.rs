use std::collections::VecDeque;
use std::sync::Arc;

use modgate_core::{AppError, AppResult};
use modgate_domain::{AuditCursor, AuditFilter, AuditRecord};

use crate::AuditLogRepository;

/// Largest page the cursor requests from storage.
pub const MAX_AUDIT_PAGE_SIZE: usize = 1000;

/// Read-side access to the append-only audit log.
#[derive(Clone)]
pub struct AuditLogService {
    repository: Arc<dyn AuditLogRepository>,
    page_size: usize,
}

impl AuditLogService {
    /// Creates a service fetching `page_size` records per storage round trip.
    pub fn new(repository: Arc<dyn AuditLogRepository>, page_size: usize) -> AppResult<Self> {
        if !(1..=MAX_AUDIT_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::Validation(format!(
                "audit page size must be between 1 and {MAX_AUDIT_PAGE_SIZE}, got {page_size}"
            )));
        }

        Ok(Self {
            repository,
            page_size,
        })
    }

    /// Starts a fresh sequence of matching records, newest first.
    ///
    /// Every call begins at the newest record; cursors never share position.
    pub fn query(&self, filter: AuditFilter) -> AppResult<AuditRecordCursor> {
        filter.validate()?;

        Ok(AuditRecordCursor {
            repository: Arc::clone(&self.repository),
            filter,
            page_size: self.page_size,
            position: None,
            buffered: VecDeque::new(),
            exhausted: false,
        })
    }
}

/// Lazy, finite sequence of audit records ordered by timestamp descending.
///
/// Pages are fetched on demand with keyset pagination, so records appended
/// while iterating never shift or duplicate what has already been returned.
pub struct AuditRecordCursor {
    repository: Arc<dyn AuditLogRepository>,
    filter: AuditFilter,
    page_size: usize,
    position: Option<AuditCursor>,
    buffered: VecDeque<AuditRecord>,
    exhausted: bool,
}

impl AuditRecordCursor {
    /// Returns the next record, or `None` once the sequence is finished.
    pub async fn next(&mut self) -> AppResult<Option<AuditRecord>> {
        if self.buffered.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }

        Ok(self.buffered.pop_front())
    }

    /// Drains the remaining records.
    pub async fn collect_all(mut self) -> AppResult<Vec<AuditRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }

        Ok(records)
    }

    async fn fetch_page(&mut self) -> AppResult<()> {
        let page = self
            .repository
            .list_page(&self.filter, self.position, self.page_size)
            .await?;

        if page.len() < self.page_size {
            self.exhausted = true;
        }

        if let Some(last) = page.last() {
            self.position = Some(last.cursor());
        }

        self.buffered.extend(page);
        Ok(())
    }
}
