use modgate_core::PlanId;
use serde::{Deserialize, Serialize};

use crate::{Action, ActionSet, PermissionMap};

/// Tenant-wide ceiling on the actions purchasable per module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    id: PlanId,
    modules: PermissionMap,
    #[serde(default)]
    max_users: Option<u32>,
    is_active: bool,
}

impl SubscriptionPlan {
    /// Creates an active plan.
    #[must_use]
    pub fn new(id: PlanId, modules: PermissionMap) -> Self {
        Self {
            id,
            modules,
            max_users: None,
            is_active: true,
        }
    }

    /// Sets the seat limit.
    #[must_use]
    pub fn with_max_users(mut self, max_users: Option<u32>) -> Self {
        self.max_users = max_users;
        self
    }

    /// Sets the activity flag.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Returns the plan id.
    #[must_use]
    pub fn id(&self) -> &PlanId {
        &self.id
    }

    /// Returns the per-module ceiling.
    #[must_use]
    pub fn modules(&self) -> &PermissionMap {
        &self.modules
    }

    /// Returns the ceiling for one module; absent modules allow nothing.
    #[must_use]
    pub fn allowed_actions(&self, module_id: &str) -> ActionSet {
        self.modules.actions(module_id)
    }

    /// Returns whether the ceiling includes the action.
    #[must_use]
    pub fn allows(&self, module_id: &str, action: Action) -> bool {
        self.modules.allows(module_id, action)
    }

    /// Returns the optional seat limit.
    #[must_use]
    pub fn max_users(&self) -> Option<u32> {
        self.max_users
    }

    /// Returns whether the plan is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Replaces the ceiling map.
    pub fn replace_modules(&mut self, modules: PermissionMap) {
        self.modules = modules;
    }
}
