use std::sync::Arc;

use modgate_application::EffectivePermissionCache;
use modgate_core::AppResult;
use modgate_infrastructure::{InMemoryEffectivePermissionCache, RedisEffectivePermissionCache};

use crate::api_config::{ApiConfig, CacheBackend};
use crate::api_services::build_redis_client;

pub(super) fn build_effective_permission_cache(
    config: &ApiConfig,
) -> AppResult<Option<Arc<dyn EffectivePermissionCache>>> {
    let cache: Arc<dyn EffectivePermissionCache> = match &config.cache_backend {
        CacheBackend::None => return Ok(None),
        CacheBackend::Memory => Arc::new(InMemoryEffectivePermissionCache::new(
            config.cache_ttl_seconds,
        )),
        CacheBackend::Redis {
            redis_url,
            key_prefix,
        } => Arc::new(RedisEffectivePermissionCache::new(
            build_redis_client(redis_url)?,
            key_prefix.clone(),
            config.cache_ttl_seconds,
        )),
    };

    Ok(Some(cache))
}
