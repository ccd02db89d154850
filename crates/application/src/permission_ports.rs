mod audit;
mod cache;
mod clock;
mod store;

pub use audit::AuditLogRepository;
pub use cache::{
    AccessFingerprint, CacheGeneration, EffectivePermissionCache, EffectivePermissionKey,
    RecordState,
};
pub use clock::Clock;
pub use store::{AccessRecords, PermissionStore};
