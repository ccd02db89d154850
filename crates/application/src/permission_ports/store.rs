use async_trait::async_trait;
use modgate_core::{AppResult, OrganizationId, PlanId, RoleId, UserId};
use modgate_domain::{
    AccessSnapshot, Module, ModuleGraph, Organization, PermissionMap, Role, SubscriptionPlan,
    User,
};

/// Owned records needed to resolve one user, read from one consistent view
/// of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRecords {
    /// Module catalog at read time.
    pub graph: ModuleGraph,
    /// User record, if it exists.
    pub user: Option<User>,
    /// The user's organization, if it exists.
    pub organization: Option<Organization>,
    /// The user's role, if it exists.
    pub role: Option<Role>,
    /// The organization's plan, if it exists.
    pub plan: Option<SubscriptionPlan>,
}

impl AccessRecords {
    /// Borrows the records as a resolver snapshot.
    #[must_use]
    pub fn snapshot<'a>(&'a self, user_id: &'a UserId) -> AccessSnapshot<'a> {
        AccessSnapshot {
            graph: &self.graph,
            user_id,
            user: self.user.as_ref(),
            organization: self.organization.as_ref(),
            role: self.role.as_ref(),
            plan: self.plan.as_ref(),
        }
    }

    /// Returns the organization and role the user is assigned to.
    #[must_use]
    pub fn assignment(&self) -> Option<(&OrganizationId, &RoleId)> {
        self.user
            .as_ref()
            .map(|user| (user.organization_id(), user.role_id()))
    }
}

/// Data store for modules, plans, roles, organizations, and users.
///
/// Implementations must make each write atomic for its record; callers
/// serialize writes to the same record.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Loads every module definition.
    async fn list_modules(&self) -> AppResult<Vec<Module>>;

    /// Inserts or replaces a module definition.
    async fn save_module(&self, module: Module) -> AppResult<()>;

    /// Deletes a module definition. Unknown ids are a `NotFound` error.
    async fn delete_module(&self, module_id: &str) -> AppResult<()>;

    /// Reads the module graph, user, organization, role, and plan for one
    /// user from a single consistent view.
    async fn load_access_records(&self, user_id: &UserId) -> AppResult<AccessRecords>;

    /// Finds a plan by id.
    async fn find_plan(&self, plan_id: &PlanId) -> AppResult<Option<SubscriptionPlan>>;

    /// Finds a role by id.
    async fn find_role(&self, role_id: &RoleId) -> AppResult<Option<Role>>;

    /// Lists organizations currently subscribed to the plan.
    async fn list_organizations_for_plan(&self, plan_id: &PlanId)
    -> AppResult<Vec<Organization>>;

    /// Lists roles of every organization subscribed to the plan.
    async fn list_roles_for_plan(&self, plan_id: &PlanId) -> AppResult<Vec<Role>>;

    /// Replaces a plan's ceiling map.
    async fn save_plan_modules(&self, plan_id: &PlanId, modules: &PermissionMap)
    -> AppResult<()>;

    /// Replaces a role's requested grant.
    async fn save_role_permissions(
        &self,
        role_id: &RoleId,
        permissions: &PermissionMap,
    ) -> AppResult<()>;
}
