use async_trait::async_trait;
use chrono::{DateTime, Utc};
use modgate_application::AuditLogRepository;
use modgate_core::{AppError, AppResult};
use modgate_domain::{
    AuditCursor, AuditFilter, AuditRecord, AuditRecordId, ModuleChange, NewAuditRecord,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed append-only audit log.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditRecordRow {
    id: uuid::Uuid,
    entity_type: String,
    entity_id: String,
    operation: String,
    changes: Json<Vec<ModuleChange>>,
    performed_by: String,
    recorded_at: DateTime<Utc>,
    reason: String,
}

impl TryFrom<AuditRecordRow> for AuditRecord {
    type Error = AppError;

    fn try_from(row: AuditRecordRow) -> Result<Self, Self::Error> {
        Ok(AuditRecord {
            id: AuditRecordId::from_uuid(row.id),
            entity_type: row.entity_type.parse()?,
            entity_id: row.entity_id,
            operation: row.operation.parse()?,
            changes: row.changes.0,
            performed_by: row.performed_by,
            timestamp: row.recorded_at,
            reason: row.reason,
        })
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn append(&self, record: NewAuditRecord) -> AppResult<AuditRecordId> {
        let id = AuditRecordId::generate();

        sqlx::query(
            r#"
            INSERT INTO permission_audit_records (
                id,
                entity_type,
                entity_id,
                operation,
                changes,
                performed_by,
                recorded_at,
                reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.as_uuid())
        .bind(record.entity_type.as_str())
        .bind(record.entity_id.as_str())
        .bind(record.operation.as_str())
        .bind(Json(&record.changes))
        .bind(record.performed_by.as_str())
        .bind(record.timestamp)
        .bind(record.reason.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit record: {error}")))?;

        Ok(id)
    }

    async fn list_page(
        &self,
        filter: &AuditFilter,
        after: Option<AuditCursor>,
        limit: usize,
    ) -> AppResult<Vec<AuditRecord>> {
        let limit = i64::try_from(limit)
            .map_err(|error| AppError::Validation(format!("invalid audit page size: {error}")))?;

        let rows = sqlx::query_as::<_, AuditRecordRow>(
            r#"
            SELECT
                id,
                entity_type,
                entity_id,
                operation,
                changes,
                performed_by,
                recorded_at,
                reason
            FROM permission_audit_records
            WHERE ($1::TEXT IS NULL OR entity_type = $1)
                AND ($2::TEXT IS NULL OR entity_id = $2)
                AND ($3::TEXT IS NULL OR performed_by = $3)
                AND ($4::TIMESTAMPTZ IS NULL OR recorded_at >= $4)
                AND ($5::TIMESTAMPTZ IS NULL OR recorded_at <= $5)
                AND ($6::TIMESTAMPTZ IS NULL OR (recorded_at, id) < ($6, $7::UUID))
            ORDER BY recorded_at DESC, id DESC
            LIMIT $8
            "#,
        )
        .bind(filter.entity_type.map(|entity_type| entity_type.as_str()))
        .bind(filter.entity_id.as_deref())
        .bind(filter.performed_by.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .bind(after.map(|cursor| cursor.timestamp))
        .bind(after.map(|cursor| cursor.id.as_uuid()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit records: {error}")))?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests;
