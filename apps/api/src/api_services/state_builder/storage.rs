use std::sync::Arc;

use modgate_application::{AuditLogRepository, PermissionStore};
use modgate_core::AppResult;
use modgate_infrastructure::{
    InMemoryAuditLogRepository, InMemoryPermissionStore, PermissionSnapshot,
    PostgresAuditLogRepository, PostgresPermissionStore,
};
use tracing::info;

use crate::api_config::{ApiConfig, StorageBackend};
use crate::api_services::connect_and_migrate;

pub(super) struct StorageAdapters {
    pub(super) store: Arc<dyn PermissionStore>,
    pub(super) audit_log: Arc<dyn AuditLogRepository>,
}

pub(super) async fn build_storage(config: &ApiConfig) -> AppResult<StorageAdapters> {
    let seed = match &config.seed_file {
        Some(path) => Some(PermissionSnapshot::load(path).await?),
        None => None,
    };

    match &config.storage_backend {
        StorageBackend::Memory => {
            let store = match seed {
                Some(snapshot) => InMemoryPermissionStore::from_snapshot(snapshot)?,
                None => {
                    info!("in-memory store starts empty, set SEED_FILE to preload it");
                    InMemoryPermissionStore::new()
                }
            };

            Ok(StorageAdapters {
                store: Arc::new(store),
                audit_log: Arc::new(InMemoryAuditLogRepository::new()),
            })
        }
        StorageBackend::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url).await?;
            let store = PostgresPermissionStore::new(pool.clone());

            if let Some(snapshot) = &seed {
                store.import_snapshot(snapshot).await?;
            }

            Ok(StorageAdapters {
                store: Arc::new(store),
                audit_log: Arc::new(PostgresAuditLogRepository::new(pool)),
            })
        }
    }
}
