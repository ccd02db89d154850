//! Redis-backed effective permission cache.

use async_trait::async_trait;
use modgate_application::{
    AccessFingerprint, CacheGeneration, EffectivePermissionCache, EffectivePermissionKey,
};
use modgate_core::{AppError, AppResult, OrganizationId, RoleId};
use modgate_domain::EffectivePermissionSet;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

/// Redis implementation of the effective permission cache port.
///
/// Generation counters are plain `INCR` keys without expiry. Entries embed the
/// generation in their key and expire after the configured TTL.
#[derive(Clone)]
pub struct RedisEffectivePermissionCache {
    client: redis::Client,
    key_prefix: String,
    ttl_seconds: u64,
}

impl RedisEffectivePermissionCache {
    /// Creates a cache adapter with a configured Redis client, key prefix, and
    /// entry lifetime.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            ttl_seconds,
        }
    }

    fn global_generation_key(&self) -> String {
        format!("{}:gen:global", self.key_prefix)
    }

    fn organization_generation_key(&self, organization_id: &OrganizationId) -> String {
        format!(
            "{}:gen:org:{}",
            self.key_prefix,
            key_part(organization_id.as_str())
        )
    }

    fn role_generation_key(&self, organization_id: &OrganizationId, role_id: &RoleId) -> String {
        format!(
            "{}:gen:role:{}{}",
            self.key_prefix,
            key_part(organization_id.as_str()),
            key_part(role_id.as_str())
        )
    }

    fn entry_key(&self, key: &EffectivePermissionKey) -> String {
        format!(
            "{}:entry:{}{}{}{}.{}.{}:{}",
            self.key_prefix,
            key_part(key.organization_id.as_str()),
            key_part(key.role_id.as_str()),
            key_part(key.user_id.as_str()),
            key.generation.global,
            key.generation.organization,
            key.generation.role,
            fingerprint_part(&key.fingerprint)
        )
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
    }

    async fn bump(&self, key: String) -> AppResult<()> {
        let mut connection = self.connection().await?;
        let _: u64 = connection.incr(key, 1_u64).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to bump effective permission cache generation: {error}"
            ))
        })?;

        Ok(())
    }
}

/// Length-prefixes an id so ids containing `:` cannot collide.
fn key_part(value: &str) -> String {
    format!("{}:{value}:", value.len())
}

fn fingerprint_part(fingerprint: &AccessFingerprint) -> String {
    let states: String = [
        fingerprint.user,
        fingerprint.organization,
        fingerprint.role,
        fingerprint.plan,
    ]
    .into_iter()
    .map(|state| state.code())
    .collect();

    match &fingerprint.plan_id {
        Some(plan_id) => format!("{states}:{}", key_part(plan_id.as_str())),
        None => format!("{states}:-"),
    }
}

#[async_trait]
impl EffectivePermissionCache for RedisEffectivePermissionCache {
    async fn generation(
        &self,
        organization_id: &OrganizationId,
        role_id: &RoleId,
    ) -> AppResult<CacheGeneration> {
        let keys = vec![
            self.global_generation_key(),
            self.organization_generation_key(organization_id),
            self.role_generation_key(organization_id, role_id),
        ];
        let mut connection = self.connection().await?;

        let values: Vec<Option<u64>> = connection.mget(keys).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to read effective permission cache generation: {error}"
            ))
        })?;

        let counter = |index: usize| values.get(index).copied().flatten().unwrap_or_default();
        Ok(CacheGeneration {
            global: counter(0),
            organization: counter(1),
            role: counter(2),
        })
    }

    async fn get(&self, key: &EffectivePermissionKey) -> AppResult<Option<EffectivePermissionSet>> {
        let mut connection = self.connection().await?;
        let encoded: Option<String> = connection.get(self.entry_key(key)).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to read effective permission cache entry: {error}"
            ))
        })?;

        encoded
            .as_deref()
            .map(|value| {
                serde_json::from_str(value).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid effective permission cache entry: {error}"
                    ))
                })
            })
            .transpose()
    }

    async fn put(
        &self,
        key: &EffectivePermissionKey,
        permissions: &EffectivePermissionSet,
    ) -> AppResult<()> {
        if self.ttl_seconds == 0 {
            return Ok(());
        }

        let value = serde_json::to_string(permissions).map_err(|error| {
            AppError::Internal(format!(
                "failed to encode effective permission cache entry: {error}"
            ))
        })?;
        let mut connection = self.connection().await?;

        connection
            .set_ex(self.entry_key(key), value, self.ttl_seconds)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write effective permission cache entry: {error}"
                ))
            })
    }

    async fn invalidate_organization(&self, organization_id: &OrganizationId) -> AppResult<()> {
        self.bump(self.organization_generation_key(organization_id))
            .await
    }

    async fn invalidate_role(
        &self,
        organization_id: &OrganizationId,
        role_id: &RoleId,
    ) -> AppResult<()> {
        self.bump(self.role_generation_key(organization_id, role_id))
            .await
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        self.bump(self.global_generation_key()).await
    }
}

#[cfg(test)]
mod tests {
    use modgate_application::{
        AccessFingerprint, CacheGeneration, EffectivePermissionCache, EffectivePermissionKey,
        RecordState,
    };
    use modgate_core::{OrganizationId, PlanId, RoleId, UserId};
    use modgate_domain::EffectivePermissionSet;

    use super::RedisEffectivePermissionCache;

    fn cache(prefix: &str) -> Option<RedisEffectivePermissionCache> {
        let redis_url = std::env::var("REDIS_URL").ok()?;
        let client = match redis::Client::open(redis_url) {
            Ok(client) => client,
            Err(error) => panic!("failed to open REDIS_URL in test: {error}"),
        };

        Some(RedisEffectivePermissionCache::new(client, prefix, 30))
    }

    fn active_on(plan: &str) -> AccessFingerprint {
        AccessFingerprint {
            plan_id: Some(PlanId::new(plan).unwrap_or_else(|_| unreachable!())),
            user: RecordState::Active,
            organization: RecordState::Active,
            role: RecordState::Active,
            plan: RecordState::Active,
        }
    }

    fn assignment_key(
        organization: &str,
        role: &str,
        user: &str,
        generation: CacheGeneration,
    ) -> EffectivePermissionKey {
        EffectivePermissionKey {
            organization_id: OrganizationId::new(organization).unwrap_or_else(|_| unreachable!()),
            role_id: RoleId::new(role).unwrap_or_else(|_| unreachable!()),
            user_id: UserId::new(user).unwrap_or_else(|_| unreachable!()),
            generation,
            fingerprint: active_on("pro"),
        }
    }

    fn key(generation: CacheGeneration) -> EffectivePermissionKey {
        assignment_key("acme", "manager", "alice", generation)
    }

    fn offline_cache() -> RedisEffectivePermissionCache {
        RedisEffectivePermissionCache::new(
            redis::Client::open("redis://127.0.0.1/").unwrap_or_else(|_| unreachable!()),
            "modgate:test",
            30,
        )
    }

    #[test]
    fn entry_keys_embed_every_generation_counter() {
        let entry = offline_cache().entry_key(&key(CacheGeneration {
            global: 1,
            organization: 2,
            role: 3,
        }));
        assert_eq!(
            entry,
            "modgate:test:entry:4:acme:7:manager:5:alice:1.2.3:aaaa:3:pro:"
        );
    }

    #[test]
    fn ids_containing_separators_do_not_share_entry_keys() {
        let cache = offline_cache();
        let generation = CacheGeneration::default();

        let first = cache.entry_key(&assignment_key("a:b", "c", "d", generation));
        let second = cache.entry_key(&assignment_key("a", "b:c", "d", generation));
        assert_ne!(first, second);

        assert_ne!(
            cache.role_generation_key(
                &OrganizationId::new("a:b").unwrap_or_else(|_| unreachable!()),
                &RoleId::new("c").unwrap_or_else(|_| unreachable!()),
            ),
            cache.role_generation_key(
                &OrganizationId::new("a").unwrap_or_else(|_| unreachable!()),
                &RoleId::new("b:c").unwrap_or_else(|_| unreachable!()),
            )
        );
    }

    #[test]
    fn record_status_and_plan_are_part_of_the_entry_key() {
        let cache = offline_cache();
        let active = key(CacheGeneration::default());

        let mut suspended = active.clone();
        suspended.fingerprint.user = RecordState::Inactive;
        let mut downgraded = active.clone();
        downgraded.fingerprint = active_on("basic");

        assert_ne!(cache.entry_key(&active), cache.entry_key(&suspended));
        assert_ne!(cache.entry_key(&active), cache.entry_key(&downgraded));
    }

    #[tokio::test]
    async fn invalidation_moves_readers_to_a_new_generation() {
        let prefix = format!("modgate:test:{}", uuid::Uuid::new_v4());
        let Some(cache) = cache(prefix.as_str()) else {
            return;
        };
        let organization_id = OrganizationId::new("acme").unwrap_or_else(|_| unreachable!());
        let role_id = RoleId::new("manager").unwrap_or_else(|_| unreachable!());

        let initial = cache
            .generation(&organization_id, &role_id)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(initial, CacheGeneration::default());

        let stored = key(initial);
        assert!(
            cache
                .put(&stored, &EffectivePermissionSet::default())
                .await
                .is_ok()
        );
        assert!(matches!(cache.get(&stored).await, Ok(Some(_))));

        assert!(cache.invalidate_organization(&organization_id).await.is_ok());
        let bumped = cache
            .generation(&organization_id, &role_id)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(bumped.organization, 1);
        assert!(matches!(cache.get(&key(bumped)).await, Ok(None)));
    }
}
