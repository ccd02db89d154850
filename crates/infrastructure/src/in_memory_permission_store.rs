use std::collections::HashMap;

use async_trait::async_trait;
use modgate_application::{AccessRecords, PermissionStore};
use modgate_core::{AppError, AppResult, ModuleId, OrganizationId, PlanId, RoleId, UserId};
use modgate_domain::{
    Module, ModuleGraph, Organization, PermissionMap, Role, SubscriptionPlan, User,
};
use tokio::sync::RwLock;

use crate::PermissionSnapshot;

#[derive(Debug, Default)]
struct StoreState {
    modules: HashMap<ModuleId, Module>,
    plans: HashMap<PlanId, SubscriptionPlan>,
    roles: HashMap<RoleId, Role>,
    organizations: HashMap<OrganizationId, Organization>,
    users: HashMap<UserId, User>,
}

/// In-memory permission store.
///
/// All records live behind one lock, so every read observes a single
/// consistent version of the data.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    state: RwLock<StoreState>,
}

impl InMemoryPermissionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the snapshot's records.
    pub fn from_snapshot(snapshot: PermissionSnapshot) -> AppResult<Self> {
        snapshot.validate()?;

        let state = StoreState {
            modules: index(snapshot.modules, |module| module.id().clone()),
            plans: index(snapshot.plans, |plan| plan.id().clone()),
            roles: index(snapshot.roles, |role| role.id().clone()),
            organizations: index(snapshot.organizations, |organization| {
                organization.id().clone()
            }),
            users: index(snapshot.users, |user| user.id().clone()),
        };

        Ok(Self {
            state: RwLock::new(state),
        })
    }
}

fn index<K, V>(values: Vec<V>, key: impl Fn(&V) -> K) -> HashMap<K, V>
where
    K: std::hash::Hash + Eq,
{
    values
        .into_iter()
        .map(|value| (key(&value), value))
        .collect()
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn list_modules(&self) -> AppResult<Vec<Module>> {
        let state = self.state.read().await;
        let mut modules: Vec<Module> = state.modules.values().cloned().collect();
        modules.sort_by(|left, right| left.id().cmp(right.id()));
        Ok(modules)
    }

    async fn save_module(&self, module: Module) -> AppResult<()> {
        self.state
            .write()
            .await
            .modules
            .insert(module.id().clone(), module);
        Ok(())
    }

    async fn delete_module(&self, module_id: &str) -> AppResult<()> {
        self.state
            .write()
            .await
            .modules
            .remove(module_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("module '{module_id}' does not exist")))
    }

    async fn load_access_records(&self, user_id: &UserId) -> AppResult<AccessRecords> {
        let state = self.state.read().await;

        let graph = ModuleGraph::new(state.modules.values().cloned())?;
        let user = state.users.get(user_id).cloned();
        let organization = user
            .as_ref()
            .and_then(|user| state.organizations.get(user.organization_id()))
            .cloned();
        let role = user
            .as_ref()
            .and_then(|user| state.roles.get(user.role_id()))
            .cloned();
        let plan = organization
            .as_ref()
            .and_then(|organization| state.plans.get(organization.subscription_plan_id()))
            .cloned();

        Ok(AccessRecords {
            graph,
            user,
            organization,
            role,
            plan,
        })
    }

    async fn find_plan(&self, plan_id: &PlanId) -> AppResult<Option<SubscriptionPlan>> {
        Ok(self.state.read().await.plans.get(plan_id).cloned())
    }

    async fn find_role(&self, role_id: &RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.read().await.roles.get(role_id).cloned())
    }

    async fn list_organizations_for_plan(
        &self,
        plan_id: &PlanId,
    ) -> AppResult<Vec<Organization>> {
        let state = self.state.read().await;
        let mut organizations: Vec<Organization> = state
            .organizations
            .values()
            .filter(|organization| organization.subscription_plan_id() == plan_id)
            .cloned()
            .collect();
        organizations.sort_by(|left, right| left.id().cmp(right.id()));
        Ok(organizations)
    }

    async fn list_roles_for_plan(&self, plan_id: &PlanId) -> AppResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .roles
            .values()
            .filter(|role| {
                state
                    .organizations
                    .get(role.organization_id())
                    .is_some_and(|organization| organization.subscription_plan_id() == plan_id)
            })
            .cloned()
            .collect();
        roles.sort_by(|left, right| left.id().cmp(right.id()));
        Ok(roles)
    }

    async fn save_plan_modules(&self, plan_id: &PlanId, modules: &PermissionMap) -> AppResult<()> {
        let mut state = self.state.write().await;
        let plan = state
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| AppError::NotFound(format!("plan '{plan_id}' does not exist")))?;
        plan.replace_modules(modules.clone());
        Ok(())
    }

    async fn save_role_permissions(
        &self,
        role_id: &RoleId,
        permissions: &PermissionMap,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let role = state
            .roles
            .get_mut(role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))?;
        role.replace_permissions(permissions.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests;
