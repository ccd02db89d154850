//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_log_repository;
mod in_memory_effective_permission_cache;
mod in_memory_permission_store;
mod permission_snapshot;
mod postgres_audit_log_repository;
mod postgres_permission_store;
mod redis_effective_permission_cache;
mod system_clock;

pub use in_memory_audit_log_repository::InMemoryAuditLogRepository;
pub use in_memory_effective_permission_cache::InMemoryEffectivePermissionCache;
pub use in_memory_permission_store::InMemoryPermissionStore;
pub use permission_snapshot::PermissionSnapshot;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_permission_store::PostgresPermissionStore;
pub use redis_effective_permission_cache::RedisEffectivePermissionCache;
pub use system_clock::SystemClock;

/// Embedded SQL migrations for the PostgreSQL adapters.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
