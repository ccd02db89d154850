use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use modgate_core::{AppError, AppResult, ModuleId, OrganizationId, PlanId, RoleId, UserId};
use modgate_domain::{
    Action, AuditCursor, AuditFilter, AuditRecord, AuditRecordId, EffectivePermissionSet, Module,
    ModuleDefinition, ModuleGraph, NewAuditRecord, Organization, PermissionMap, Role,
    SubscriptionPlan, User,
};
use tokio::sync::Mutex;

use crate::{
    AccessRecords, AuditLogRepository, CacheGeneration, Clock, EffectivePermissionCache,
    EffectivePermissionKey, PermissionStore,
};

pub(crate) fn module_id(value: &str) -> ModuleId {
    ModuleId::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn role_id(value: &str) -> RoleId {
    RoleId::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn plan_id(value: &str) -> PlanId {
    PlanId::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn organization_id(value: &str) -> OrganizationId {
    OrganizationId::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn user_id(value: &str) -> UserId {
    UserId::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn grant(module: &str, actions: &[Action]) -> (ModuleId, BTreeSet<Action>) {
    (module_id(module), actions.iter().copied().collect())
}

pub(crate) fn module(definition: ModuleDefinition) -> Module {
    Module::new(definition).unwrap_or_else(|_| unreachable!())
}

#[derive(Default)]
pub(crate) struct StoreState {
    pub(crate) modules: Vec<Module>,
    pub(crate) plans: HashMap<PlanId, SubscriptionPlan>,
    pub(crate) roles: HashMap<RoleId, Role>,
    pub(crate) organizations: HashMap<OrganizationId, Organization>,
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) failing_writes: BTreeSet<String>,
    pub(crate) access_loads: usize,
}

/// Store seeded with plan `pro` and `basic`, organization `acme` on `pro`,
/// roles `manager`/`viewer`, and users `alice` (manager) and `bob` (viewer).
#[derive(Default)]
pub(crate) struct FakeStore {
    pub(crate) state: Mutex<StoreState>,
}

impl FakeStore {
    pub(crate) fn seeded() -> Self {
        let acme = organization_id("acme");
        let mut state = StoreState {
            modules: vec![
                module(ModuleDefinition::new("crm", "CRM").with_actions([
                    Action::View,
                    Action::Edit,
                    Action::Manage,
                ])),
                module(ModuleDefinition::new("billing", "Billing").depends_on(["crm"])),
                module(
                    ModuleDefinition::new("dashboard", "Dashboard")
                        .with_actions([Action::View])
                        .core(),
                ),
            ],
            ..StoreState::default()
        };

        for plan in [
            SubscriptionPlan::new(
                plan_id("pro"),
                PermissionMap::from_iter([
                    grant("crm", &[Action::View, Action::Edit, Action::Manage]),
                    grant("billing", &[Action::View, Action::Edit]),
                    grant("dashboard", &[Action::View]),
                ]),
            ),
            SubscriptionPlan::new(
                plan_id("basic"),
                PermissionMap::from_iter([
                    grant("crm", &[Action::View]),
                    grant("dashboard", &[Action::View]),
                ]),
            ),
        ] {
            state.plans.insert(plan.id().clone(), plan);
        }

        for role in [
            Role::new(
                role_id("manager"),
                acme.clone(),
                PermissionMap::from_iter([
                    grant("crm", &[Action::View, Action::Edit]),
                    grant("dashboard", &[Action::View]),
                ]),
            ),
            Role::new(
                role_id("viewer"),
                acme.clone(),
                PermissionMap::from_iter([
                    grant("crm", &[Action::View]),
                    grant("dashboard", &[Action::View]),
                ]),
            ),
        ] {
            state.roles.insert(role.id().clone(), role);
        }

        state.organizations.insert(
            acme.clone(),
            Organization::new(acme.clone(), plan_id("pro")),
        );

        for user in [
            User::new(user_id("alice"), acme.clone(), role_id("manager")),
            User::new(user_id("bob"), acme, role_id("viewer")),
        ] {
            state.users.insert(user.id().clone(), user);
        }

        Self {
            state: Mutex::new(state),
        }
    }

    pub(crate) async fn fail_writes_to(&self, target_id: &str) {
        self.state
            .lock()
            .await
            .failing_writes
            .insert(target_id.to_owned());
    }

    pub(crate) async fn role(&self, id: &str) -> Option<Role> {
        self.state.lock().await.roles.get(id).cloned()
    }

    pub(crate) async fn plan(&self, id: &str) -> Option<SubscriptionPlan> {
        self.state.lock().await.plans.get(id).cloned()
    }

    pub(crate) async fn access_loads(&self) -> usize {
        self.state.lock().await.access_loads
    }
}

#[async_trait]
impl PermissionStore for FakeStore {
    async fn list_modules(&self) -> AppResult<Vec<Module>> {
        Ok(self.state.lock().await.modules.clone())
    }

    async fn save_module(&self, module: Module) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.modules.retain(|existing| existing.id() != module.id());
        state.modules.push(module);
        Ok(())
    }

    async fn delete_module(&self, module_id: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let before = state.modules.len();
        state
            .modules
            .retain(|existing| existing.id().as_str() != module_id);
        if state.modules.len() == before {
            return Err(AppError::NotFound(format!(
                "module '{module_id}' does not exist"
            )));
        }
        Ok(())
    }

    async fn load_access_records(&self, user_id: &UserId) -> AppResult<AccessRecords> {
        let mut state = self.state.lock().await;
        state.access_loads += 1;

        let graph = ModuleGraph::new(state.modules.clone())?;
        let user = state.users.get(user_id).cloned();
        let organization = user
            .as_ref()
            .and_then(|user| state.organizations.get(user.organization_id()).cloned());
        let role = user
            .as_ref()
            .and_then(|user| state.roles.get(user.role_id()).cloned());
        let plan = organization.as_ref().and_then(|organization| {
            state
                .plans
                .get(organization.subscription_plan_id())
                .cloned()
        });

        Ok(AccessRecords {
            graph,
            user,
            organization,
            role,
            plan,
        })
    }

    async fn find_plan(&self, plan_id: &PlanId) -> AppResult<Option<SubscriptionPlan>> {
        Ok(self.state.lock().await.plans.get(plan_id).cloned())
    }

    async fn find_role(&self, role_id: &RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.lock().await.roles.get(role_id).cloned())
    }

    async fn list_organizations_for_plan(
        &self,
        plan_id: &PlanId,
    ) -> AppResult<Vec<Organization>> {
        Ok(self
            .state
            .lock()
            .await
            .organizations
            .values()
            .filter(|organization| organization.subscription_plan_id() == plan_id)
            .cloned()
            .collect())
    }

    async fn list_roles_for_plan(&self, plan_id: &PlanId) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
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
        let mut state = self.state.lock().await;
        if state.failing_writes.contains(plan_id.as_str()) {
            return Err(AppError::Unavailable("store offline".to_owned()));
        }
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
        let mut state = self.state.lock().await;
        if state.failing_writes.contains(role_id.as_str()) {
            return Err(AppError::Unavailable("store offline".to_owned()));
        }
        let role = state
            .roles
            .get_mut(role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))?;
        role.replace_permissions(permissions.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditLog {
    pub(crate) records: Mutex<Vec<AuditRecord>>,
    pub(crate) list_calls: Mutex<usize>,
    pub(crate) offline: Mutex<bool>,
}

impl FakeAuditLog {
    pub(crate) fn offline() -> Self {
        Self {
            offline: Mutex::new(true),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AuditLogRepository for FakeAuditLog {
    async fn append(&self, record: NewAuditRecord) -> AppResult<AuditRecordId> {
        if *self.offline.lock().await {
            return Err(AppError::Unavailable("audit log offline".to_owned()));
        }
        let id = AuditRecordId::generate();
        self.records
            .lock()
            .await
            .push(AuditRecord::from_new(id, record));
        Ok(id)
    }

    async fn list_page(
        &self,
        filter: &AuditFilter,
        after: Option<AuditCursor>,
        limit: usize,
    ) -> AppResult<Vec<AuditRecord>> {
        *self.list_calls.lock().await += 1;

        let mut matching: Vec<AuditRecord> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| filter.matches(record))
            .filter(|record| after.is_none_or(|cursor| cursor.precedes(record)))
            .cloned()
            .collect();
        matching.sort_by(|left, right| {
            (right.timestamp, right.id).cmp(&(left.timestamp, left.id))
        });
        matching.truncate(limit);
        Ok(matching)
    }
}

#[derive(Default)]
pub(crate) struct FakeCache {
    pub(crate) entries: Mutex<HashMap<EffectivePermissionKey, EffectivePermissionSet>>,
    pub(crate) generations: Mutex<HashMap<String, u64>>,
    pub(crate) offline: Mutex<bool>,
}

impl FakeCache {
    pub(crate) fn offline() -> Self {
        Self {
            offline: Mutex::new(true),
            ..Self::default()
        }
    }

    async fn counter(&self, scope: String) -> u64 {
        self.generations
            .lock()
            .await
            .get(&scope)
            .copied()
            .unwrap_or_default()
    }

    async fn bump(&self, scope: String) -> AppResult<()> {
        if *self.offline.lock().await {
            return Err(AppError::Unavailable("cache offline".to_owned()));
        }
        *self.generations.lock().await.entry(scope).or_default() += 1;
        Ok(())
    }
}

#[async_trait]
impl EffectivePermissionCache for FakeCache {
    async fn generation(
        &self,
        organization_id: &OrganizationId,
        role_id: &RoleId,
    ) -> AppResult<CacheGeneration> {
        Ok(CacheGeneration {
            global: self.counter("global".to_owned()).await,
            organization: self.counter(format!("org:{organization_id}")).await,
            role: self
                .counter(format!("role:{organization_id}:{role_id}"))
                .await,
        })
    }

    async fn get(&self, key: &EffectivePermissionKey) -> AppResult<Option<EffectivePermissionSet>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(
        &self,
        key: &EffectivePermissionKey,
        permissions: &EffectivePermissionSet,
    ) -> AppResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.clone(), permissions.clone());
        Ok(())
    }

    async fn invalidate_organization(&self, organization_id: &OrganizationId) -> AppResult<()> {
        self.bump(format!("org:{organization_id}")).await
    }

    async fn invalidate_role(
        &self,
        organization_id: &OrganizationId,
        role_id: &RoleId,
    ) -> AppResult<()> {
        self.bump(format!("role:{organization_id}:{role_id}")).await
    }

    async fn invalidate_all(&self) -> AppResult<()> {
        self.bump("global".to_owned()).await
    }
}

pub(crate) struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .single()
            .unwrap_or_else(|| unreachable!())
    }
}
