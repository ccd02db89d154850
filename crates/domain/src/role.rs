use modgate_core::{OrganizationId, RoleId};
use serde::{Deserialize, Serialize};

use crate::{Action, PermissionMap};

/// Organization-defined grant of actions to a group of users.
///
/// The grant is not clipped to the plan when written; the ceiling applies at
/// resolution time so administrators can prepare roles ahead of an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    organization_id: OrganizationId,
    permissions: PermissionMap,
    is_active: bool,
}

impl Role {
    /// Creates an active role.
    #[must_use]
    pub fn new(id: RoleId, organization_id: OrganizationId, permissions: PermissionMap) -> Self {
        Self {
            id,
            organization_id,
            permissions,
            is_active: true,
        }
    }

    /// Sets the activity flag.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Returns the role id.
    #[must_use]
    pub fn id(&self) -> &RoleId {
        &self.id
    }

    /// Returns the owning organization.
    #[must_use]
    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    /// Returns the requested grant.
    #[must_use]
    pub fn permissions(&self) -> &PermissionMap {
        &self.permissions
    }

    /// Returns whether the role requests the action.
    #[must_use]
    pub fn requests(&self, module_id: &str, action: Action) -> bool {
        self.permissions.allows(module_id, action)
    }

    /// Returns whether the role is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Replaces the requested grant.
    pub fn replace_permissions(&mut self, permissions: PermissionMap) {
        self.permissions = permissions;
    }
}
