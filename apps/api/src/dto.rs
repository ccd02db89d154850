mod audit;
mod bulk_updates;
mod common;
mod modules;
mod permissions;

pub use audit::{AuditLogQuery, AuditRecordResponse};
pub use bulk_updates::{BulkUpdateRequest, BulkUpdateResponse};
pub use common::{HealthResponse, PermissionConflictResponse};
pub use modules::{
    CatalogChangeResponse, CreateModuleRequest, ModuleResponse, ModuleValidationResponse,
    RemoveModuleQuery,
};
pub use permissions::{EffectivePermissionsResponse, PermissionCheckResponse};
