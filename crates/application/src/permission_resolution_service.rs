use std::sync::Arc;

use modgate_core::{AppResult, UserId};
use modgate_domain::{
    Action, EffectivePermissionSet, PermissionCheck, resolve_effective_permissions,
    resolve_permission,
};
use tracing::warn;

use crate::{
    AccessFingerprint, AccessRecords, EffectivePermissionCache, EffectivePermissionKey,
    PermissionStore,
};

/// Read-side service computing effective permissions.
#[derive(Clone)]
pub struct PermissionResolutionService {
    store: Arc<dyn PermissionStore>,
    cache: Option<Arc<dyn EffectivePermissionCache>>,
}

impl PermissionResolutionService {
    /// Creates an uncached resolution service.
    #[must_use]
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store, cache: None }
    }

    /// Enables the effective permission cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn EffectivePermissionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolves every granted or restricted permission of a user.
    ///
    /// Missing or inactive records never fail the call; they close the
    /// affected layer and come back as conflicts.
    pub async fn resolve_effective_permissions(
        &self,
        user_id: &UserId,
    ) -> AppResult<EffectivePermissionSet> {
        let records = self.store.load_access_records(user_id).await?;

        let Some(cache) = &self.cache else {
            return Ok(resolve_effective_permissions(&records.snapshot(user_id)));
        };

        let Some((organization_id, role_id)) = records.assignment() else {
            return Ok(resolve_effective_permissions(&records.snapshot(user_id)));
        };

        let generation = match cache.generation(organization_id, role_id).await {
            Ok(generation) => generation,
            Err(error) => {
                warn!(user_id = %user_id, error = %error, "effective permission cache unavailable");
                return Ok(resolve_effective_permissions(&records.snapshot(user_id)));
            }
        };

        let key = EffectivePermissionKey {
            organization_id: organization_id.clone(),
            role_id: role_id.clone(),
            user_id: user_id.clone(),
            generation,
            fingerprint: AccessFingerprint::of(&records),
        };

        match cache.get(&key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(error) => {
                warn!(user_id = %user_id, error = %error, "effective permission cache read failed");
            }
        }

        // Re-read after the generation so every mutation invalidated before
        // it is visible in what gets cached under it.
        let fresh = self.store.load_access_records(user_id).await?;
        let resolved = resolve_effective_permissions(&fresh.snapshot(user_id));

        if same_access(&key, &records, &fresh)
            && let Err(error) = cache.put(&key, &resolved).await
        {
            warn!(user_id = %user_id, error = %error, "effective permission cache write failed");
        }

        Ok(resolved)
    }

    /// Resolves one `(module, action)` pair for a user from fresh records.
    pub async fn check_permission(
        &self,
        user_id: &UserId,
        module_id: &str,
        action: Action,
    ) -> AppResult<PermissionCheck> {
        let records = self.store.load_access_records(user_id).await?;
        Ok(resolve_permission(
            &records.snapshot(user_id),
            module_id,
            action,
        ))
    }
}

/// A set is only cached under the key it was looked up with when the
/// re-read records still match that key.
fn same_access(
    key: &EffectivePermissionKey,
    first: &AccessRecords,
    second: &AccessRecords,
) -> bool {
    first.assignment() == second.assignment() && AccessFingerprint::of(second) == key.fingerprint
}
