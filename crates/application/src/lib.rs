//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_log_service;
mod bulk_update_service;
mod module_catalog_service;
mod permission_ports;
mod permission_resolution_service;
#[cfg(test)]
mod test_support;
mod write_locks;

pub use audit_log_service::{AuditLogService, AuditRecordCursor, MAX_AUDIT_PAGE_SIZE};
pub use bulk_update_service::BulkUpdateService;
pub use module_catalog_service::{CatalogChangeOutcome, ModuleCatalogService};
pub use permission_ports::{
    AccessFingerprint, AccessRecords, AuditLogRepository, CacheGeneration, Clock,
    EffectivePermissionCache, EffectivePermissionKey, PermissionStore, RecordState,
};
pub use permission_resolution_service::PermissionResolutionService;
pub use write_locks::CatalogLock;
