use modgate_application::{
    AuditLogService, BulkUpdateService, ModuleCatalogService, PermissionResolutionService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub permission_resolution_service: PermissionResolutionService,
    pub module_catalog_service: ModuleCatalogService,
    pub bulk_update_service: BulkUpdateService,
    pub audit_log_service: AuditLogService,
    pub storage_backend: &'static str,
    pub cache_backend: &'static str,
}
