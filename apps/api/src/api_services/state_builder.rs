use std::sync::Arc;

use modgate_application::{
    AuditLogRepository, AuditLogService, BulkUpdateService, CatalogLock, Clock,
    EffectivePermissionCache, ModuleCatalogService, PermissionResolutionService, PermissionStore,
};
use modgate_core::AppResult;
use modgate_infrastructure::SystemClock;

use crate::api_config::ApiConfig;
use crate::state::AppState;

mod caches;
mod storage;

pub async fn build_app_state(config: &ApiConfig) -> AppResult<AppState> {
    let storage = storage::build_storage(config).await?;
    let cache = caches::build_effective_permission_cache(config)?;

    assemble_app_state(config, storage.store, storage.audit_log, cache)
}

/// Wires services around already-built adapters. One catalog lock is shared
/// by the catalog and bulk update services.
pub fn assemble_app_state(
    config: &ApiConfig,
    store: Arc<dyn PermissionStore>,
    audit_log: Arc<dyn AuditLogRepository>,
    cache: Option<Arc<dyn EffectivePermissionCache>>,
) -> AppResult<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let catalog_lock = CatalogLock::new();

    let mut permission_resolution_service = PermissionResolutionService::new(store.clone());
    let mut module_catalog_service = ModuleCatalogService::new(
        store.clone(),
        audit_log.clone(),
        clock.clone(),
        catalog_lock.clone(),
    );
    let mut bulk_update_service =
        BulkUpdateService::new(store, audit_log.clone(), clock, catalog_lock);

    if let Some(cache) = cache {
        permission_resolution_service = permission_resolution_service.with_cache(cache.clone());
        module_catalog_service = module_catalog_service.with_cache(cache.clone());
        bulk_update_service = bulk_update_service.with_cache(cache);
    }

    Ok(AppState {
        permission_resolution_service,
        module_catalog_service,
        bulk_update_service,
        audit_log_service: AuditLogService::new(audit_log, config.audit_page_size)?,
        storage_backend: config.storage_backend.as_str(),
        cache_backend: config.cache_backend.as_str(),
    })
}
