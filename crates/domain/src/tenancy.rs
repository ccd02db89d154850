use modgate_core::{OrganizationId, PlanId, RoleId, UserId};
use serde::{Deserialize, Serialize};

/// Tenant owning exactly one subscription plan reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    id: OrganizationId,
    subscription_plan_id: PlanId,
    is_active: bool,
}

impl Organization {
    /// Creates an active organization on the given plan.
    #[must_use]
    pub fn new(id: OrganizationId, subscription_plan_id: PlanId) -> Self {
        Self {
            id,
            subscription_plan_id,
            is_active: true,
        }
    }

    /// Sets the activity flag.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Returns the organization id.
    #[must_use]
    pub fn id(&self) -> &OrganizationId {
        &self.id
    }

    /// Returns the current plan reference.
    #[must_use]
    pub fn subscription_plan_id(&self) -> &PlanId {
        &self.subscription_plan_id
    }

    /// Returns whether the organization is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// User assigned to exactly one role inside one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    organization_id: OrganizationId,
    role_id: RoleId,
    is_active: bool,
}

impl User {
    /// Creates an active user.
    #[must_use]
    pub fn new(id: UserId, organization_id: OrganizationId, role_id: RoleId) -> Self {
        Self {
            id,
            organization_id,
            role_id,
            is_active: true,
        }
    }

    /// Sets the activity flag.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Returns the user id.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Returns the owning organization.
    #[must_use]
    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    /// Returns the assigned role.
    #[must_use]
    pub fn role_id(&self) -> &RoleId {
        &self.role_id
    }

    /// Returns whether the user is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }
}
