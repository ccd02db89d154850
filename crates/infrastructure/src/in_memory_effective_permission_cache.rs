use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use modgate_application::{CacheGeneration, EffectivePermissionCache, EffectivePermissionKey};
use modgate_core::{AppResult, OrganizationId, RoleId};
use modgate_domain::EffectivePermissionSet;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    permissions: EffectivePermissionSet,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Generations {
    global: u64,
    organizations: HashMap<OrganizationId, u64>,
    roles: HashMap<(OrganizationId, RoleId), u64>,
}

/// Process-local effective permission cache.
///
/// Invalidation bumps generation counters; entries stored under an older
/// generation become unreachable and are dropped on their next lookup or
/// once they expire.
#[derive(Debug)]
pub struct InMemoryEffectivePermissionCache {
    ttl: Duration,
    entries: RwLock<HashMap<EffectivePermissionKey, CacheEntry>>,
    generations: RwLock<Generations>,
}

impl InMemoryEffectivePermissionCache {
    /// Creates an empty cache whose entries live for `ttl_seconds`.
    #[must_use]
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_seconds),
            entries: RwLock::new(HashMap::new()),
            generations: RwLock::new(Generations::default()),
        }
    }

    async fn purge_expired(&self) {
        let now = Instant::now();
        self.entries
            .write()
            .await
            .retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl EffectivePermissionCache for InMemoryEffectivePermissionCache {
    async fn generation(
        &self,
        organization_id: &OrganizationId,
        role_id: &RoleId,
    ) -> AppResult<CacheGeneration> {
        let generations = self.generations.read().await;

        Ok(CacheGeneration {
            global: generations.global,
            organization: generations
                .organizations
                .get(organization_id)
                .copied()
                .unwrap_or_default(),
            role: generations
                .roles
                .get(&(organization_id.clone(), role_id.clone()))
                .copied()
                .unwrap_or_default(),
        })
    }

    async fn get(&self, key: &EffectivePermissionKey) -> AppResult<Option<EffectivePermissionSet>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.permissions.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn put(
        &self,
        key: &EffectivePermissionKey,
        permissions: &EffectivePermissionSet,
    ) -> AppResult<()> {
        if self.ttl.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now.checked_add(self.ttl).unwrap_or(now);
        self.entries.write().await.insert(
            key.clone(),
            CacheEntry {
                permissions: permissions.clone(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn invalidate_organization(&self, organization_id: &OrganizationId) -> AppResult<()> {
        *self
            .generations
            .write()
            .await
            .organizations
            .entry(organization_id.clone())
            .or_default() += 1;
        self.purge_expired().await;
        Ok(())
    }

    async fn invalidate_role(
        &self,
        organization_id: &OrganizationId,
        role_id: &RoleId,
    ) -> AppResult<()> {
        *self
            .generations
            .write()
            .await
            .roles
            .entry((organization_id.clone(), role_id.clone()))
            .or_default() += 1;
        self.purge_expired().await;
        Ok(())
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        self.generations.write().await.global += 1;
        self.entries.write().await.clear();
        Ok(())
    }
}
