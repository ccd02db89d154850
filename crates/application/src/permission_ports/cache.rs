use async_trait::async_trait;
use modgate_core::{AppResult, OrganizationId, PlanId, RoleId, UserId};
use modgate_domain::EffectivePermissionSet;

use crate::AccessRecords;

/// Invalidation counters that scope a cached entry.
///
/// Invalidating bumps a counter instead of deleting entries. An entry written
/// under an older generation is never read again, so a resolution that raced
/// a mutation cannot resurrect a stale set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CacheGeneration {
    /// Bumped by catalog-wide invalidation.
    pub global: u64,
    /// Bumped by organization-scoped invalidation.
    pub organization: u64,
    /// Bumped by role-scoped invalidation.
    pub role: u64,
}

/// Presence and status of one record a set was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// The record does not exist.
    Missing,
    /// The record exists but is suspended.
    Inactive,
    /// The record exists and is active.
    Active,
}

impl RecordState {
    fn of(is_active: Option<bool>) -> Self {
        match is_active {
            None => Self::Missing,
            Some(false) => Self::Inactive,
            Some(true) => Self::Active,
        }
    }

    /// Returns a stable one-letter code.
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Missing => 'm',
            Self::Inactive => 'i',
            Self::Active => 'a',
        }
    }
}

/// Record facts that change a resolution without bumping any generation.
///
/// Deactivating a user, organization, role or plan, or moving an
/// organization to another plan, happens outside the engine. The fingerprint
/// is taken from freshly read records, so such changes move readers to a
/// different key instead of serving a set resolved before them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessFingerprint {
    /// Plan the organization subscribes to.
    pub plan_id: Option<PlanId>,
    /// User record state.
    pub user: RecordState,
    /// Organization record state.
    pub organization: RecordState,
    /// Role record state.
    pub role: RecordState,
    /// Plan record state.
    pub plan: RecordState,
}

impl AccessFingerprint {
    /// Fingerprints the records of one resolution.
    #[must_use]
    pub fn of(records: &AccessRecords) -> Self {
        Self {
            plan_id: records
                .organization
                .as_ref()
                .map(|organization| organization.subscription_plan_id().clone()),
            user: RecordState::of(records.user.as_ref().map(|user| user.is_active())),
            organization: RecordState::of(
                records
                    .organization
                    .as_ref()
                    .map(|organization| organization.is_active()),
            ),
            role: RecordState::of(records.role.as_ref().map(|role| role.is_active())),
            plan: RecordState::of(records.plan.as_ref().map(|plan| plan.is_active())),
        }
    }
}

/// Cache key of one user's effective permission set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectivePermissionKey {
    /// Organization the user belongs to.
    pub organization_id: OrganizationId,
    /// Role the user holds.
    pub role_id: RoleId,
    /// User being resolved.
    pub user_id: UserId,
    /// Generation current when the snapshot was read.
    pub generation: CacheGeneration,
    /// Status of the records the set was resolved from.
    pub fingerprint: AccessFingerprint,
}

/// Optional cache of resolved effective permission sets.
#[async_trait]
pub trait EffectivePermissionCache: Send + Sync {
    /// Returns the current invalidation generation for an organization/role.
    async fn generation(
        &self,
        organization_id: &OrganizationId,
        role_id: &RoleId,
    ) -> AppResult<CacheGeneration>;

    /// Returns a cached set.
    async fn get(&self, key: &EffectivePermissionKey) -> AppResult<Option<EffectivePermissionSet>>;

    /// Stores a set.
    async fn put(
        &self,
        key: &EffectivePermissionKey,
        permissions: &EffectivePermissionSet,
    ) -> AppResult<()>;

    /// Invalidates every user of an organization.
    async fn invalidate_organization(&self, organization_id: &OrganizationId) -> AppResult<()>;

    /// Invalidates users holding one role.
    async fn invalidate_role(
        &self,
        organization_id: &OrganizationId,
        role_id: &RoleId,
    ) -> AppResult<()>;

    /// Invalidates every cached set.
    async fn invalidate_all(&self) -> AppResult<()>;
}
