use chrono::{DateTime, Utc};
use modgate_core::AppResult;
use modgate_domain::{AuditEntityType, AuditFilter, AuditOperation, AuditRecord, ModuleChange};
use serde::{Deserialize, Serialize};

use super::common::action_names;

/// Query string of the audit log listing.
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub performed_by: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Stops reading after this many records.
    pub limit: Option<usize>,
}

impl AuditLogQuery {
    pub fn filter(&self) -> AppResult<AuditFilter> {
        Ok(AuditFilter {
            entity_type: self
                .entity_type
                .as_deref()
                .map(str::parse::<AuditEntityType>)
                .transpose()?,
            entity_id: self.entity_id.clone(),
            performed_by: self.performed_by.clone(),
            from: self.from,
            to: self.to,
        })
    }
}

/// Before and after actions of one touched module.
#[derive(Debug, Serialize)]
pub struct ModuleChangeResponse {
    pub module_id: String,
    pub before: Vec<&'static str>,
    pub after: Vec<&'static str>,
}

impl From<ModuleChange> for ModuleChangeResponse {
    fn from(change: ModuleChange) -> Self {
        Self {
            module_id: change.module_id.as_str().to_owned(),
            before: action_names(&change.before),
            after: action_names(&change.after),
        }
    }
}

/// API representation of an audit record.
#[derive(Debug, Serialize)]
pub struct AuditRecordResponse {
    pub id: String,
    pub entity_type: AuditEntityType,
    pub entity_id: String,
    pub operation: AuditOperation,
    pub changes: Vec<ModuleChangeResponse>,
    pub performed_by: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

impl From<AuditRecord> for AuditRecordResponse {
    fn from(record: AuditRecord) -> Self {
        Self {
            id: record.id.to_string(),
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            operation: record.operation,
            changes: record
                .changes
                .into_iter()
                .map(ModuleChangeResponse::from)
                .collect(),
            performed_by: record.performed_by,
            timestamp: record.timestamp,
            reason: record.reason,
        }
    }
}
