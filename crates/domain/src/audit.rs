use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use modgate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BulkTargetType, ModuleChange};

/// Identifier of an appended audit record.
///
/// Version 7 UUIDs sort by creation time, which keeps the keyset order stable
/// for records sharing a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditRecordId(Uuid);

impl AuditRecordId {
    /// Generates a new time-ordered identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing identifier.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for AuditRecordId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(formatter)
    }
}

impl FromStr for AuditRecordId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid audit record id: {error}")))
    }
}

/// Kind of entity an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    /// Role grant.
    Role,
    /// Subscription plan ceiling.
    SubscriptionPlan,
    /// Module catalog entry.
    Module,
}

impl AuditEntityType {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::SubscriptionPlan => "subscription_plan",
            Self::Module => "module",
        }
    }
}

impl From<BulkTargetType> for AuditEntityType {
    fn from(value: BulkTargetType) -> Self {
        match value {
            BulkTargetType::Role => Self::Role,
            BulkTargetType::Subscription => Self::SubscriptionPlan,
        }
    }
}

impl FromStr for AuditEntityType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "role" => Ok(Self::Role),
            "subscription_plan" => Ok(Self::SubscriptionPlan),
            "module" => Ok(Self::Module),
            _ => Err(AppError::Validation(format!(
                "unknown audit entity type '{value}'"
            ))),
        }
    }
}

/// Mutation recorded by the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// Committed bulk permission update target.
    BulkPermissionUpdate,
    /// Module added to the catalog.
    ModuleAdded,
    /// Module removed from the catalog.
    ModuleRemoved,
}

impl AuditOperation {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BulkPermissionUpdate => "bulk_permission_update",
            Self::ModuleAdded => "module_added",
            Self::ModuleRemoved => "module_removed",
        }
    }
}

impl FromStr for AuditOperation {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bulk_permission_update" => Ok(Self::BulkPermissionUpdate),
            "module_added" => Ok(Self::ModuleAdded),
            "module_removed" => Ok(Self::ModuleRemoved),
            _ => Err(AppError::Validation(format!(
                "unknown audit operation '{value}'"
            ))),
        }
    }
}

/// Audit payload before the log assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    /// Kind of the changed entity.
    pub entity_type: AuditEntityType,
    /// Id of the changed entity.
    pub entity_id: String,
    /// Mutation performed.
    pub operation: AuditOperation,
    /// Before/after action sets per touched module.
    pub changes: Vec<ModuleChange>,
    /// Caller identity.
    pub performed_by: String,
    /// Operation time.
    pub timestamp: DateTime<Utc>,
    /// Justification supplied by the caller.
    pub reason: String,
}

/// Immutable, appended audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Record id.
    pub id: AuditRecordId,
    /// Kind of the changed entity.
    pub entity_type: AuditEntityType,
    /// Id of the changed entity.
    pub entity_id: String,
    /// Mutation performed.
    pub operation: AuditOperation,
    /// Before/after action sets per touched module.
    pub changes: Vec<ModuleChange>,
    /// Caller identity.
    pub performed_by: String,
    /// Operation time.
    pub timestamp: DateTime<Utc>,
    /// Justification supplied by the caller.
    pub reason: String,
}

impl AuditRecord {
    /// Attaches an id to a pending record.
    #[must_use]
    pub fn from_new(id: AuditRecordId, record: NewAuditRecord) -> Self {
        Self {
            id,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            operation: record.operation,
            changes: record.changes,
            performed_by: record.performed_by,
            timestamp: record.timestamp,
            reason: record.reason,
        }
    }

    /// Returns the keyset position of this record.
    #[must_use]
    pub fn cursor(&self) -> AuditCursor {
        AuditCursor {
            timestamp: self.timestamp,
            id: self.id,
        }
    }
}

/// Optional predicates over audit records. `from` and `to` are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Entity kind.
    pub entity_type: Option<AuditEntityType>,
    /// Entity id.
    pub entity_id: Option<String>,
    /// Caller identity.
    pub performed_by: Option<String>,
    /// Earliest timestamp.
    pub from: Option<DateTime<Utc>>,
    /// Latest timestamp.
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// Rejects inverted date ranges.
    pub fn validate(&self) -> AppResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(AppError::Validation(format!(
                "audit filter range is inverted: {from} is after {to}"
            )));
        }

        Ok(())
    }

    /// Returns whether a record satisfies every set predicate.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.entity_type
            .is_none_or(|entity_type| entity_type == record.entity_type)
            && self
                .entity_id
                .as_deref()
                .is_none_or(|entity_id| entity_id == record.entity_id)
            && self
                .performed_by
                .as_deref()
                .is_none_or(|performed_by| performed_by == record.performed_by)
            && self.from.is_none_or(|from| record.timestamp >= from)
            && self.to.is_none_or(|to| record.timestamp <= to)
    }
}

/// Keyset position in `(timestamp DESC, id DESC)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditCursor {
    /// Timestamp of the last record returned.
    pub timestamp: DateTime<Utc>,
    /// Id of the last record returned.
    pub id: AuditRecordId,
}

impl AuditCursor {
    /// Returns whether the record sorts strictly after this position.
    #[must_use]
    pub fn precedes(&self, record: &AuditRecord) -> bool {
        (record.timestamp, record.id) < (self.timestamp, self.id)
    }
}
