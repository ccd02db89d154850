use std::collections::BTreeSet;

use modgate_core::{AppError, AppResult, OrganizationId, PlanId, RoleId, UserId};
use modgate_domain::{
    Action, ActionSet, Module, ModuleDefinition, Organization, PermissionMap, Role,
    SubscriptionPlan, User,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};

#[derive(Debug, FromRow)]
pub(super) struct ModuleRow {
    id: String,
    display_name: String,
    category: String,
    available_actions: Vec<String>,
    dependencies: Vec<String>,
    is_core: bool,
    display_order: i32,
}

impl TryFrom<ModuleRow> for Module {
    type Error = AppError;

    fn try_from(row: ModuleRow) -> Result<Self, Self::Error> {
        let available_actions = row
            .available_actions
            .iter()
            .map(|value| value.parse::<Action>())
            .collect::<AppResult<ActionSet>>()?;

        Module::new(ModuleDefinition {
            id: row.id,
            display_name: row.display_name,
            category: row.category,
            available_actions,
            dependencies: row.dependencies.into_iter().collect::<BTreeSet<_>>(),
            is_core: row.is_core,
            order: row.display_order,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct PlanRow {
    id: String,
    modules: Json<PermissionMap>,
    max_users: Option<i32>,
    is_active: bool,
}

impl TryFrom<PlanRow> for SubscriptionPlan {
    type Error = AppError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let max_users = row
            .max_users
            .map(u32::try_from)
            .transpose()
            .map_err(|error| {
                AppError::Internal(format!("invalid max_users for plan '{}': {error}", row.id))
            })?;

        Ok(SubscriptionPlan::new(PlanId::new(row.id)?, row.modules.0)
            .with_max_users(max_users)
            .with_active(row.is_active))
    }
}

#[derive(Debug, FromRow)]
pub(super) struct RoleRow {
    id: String,
    organization_id: String,
    permissions: Json<PermissionMap>,
    is_active: bool,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(Role::new(
            RoleId::new(row.id)?,
            OrganizationId::new(row.organization_id)?,
            row.permissions.0,
        )
        .with_active(row.is_active))
    }
}

#[derive(Debug, FromRow)]
pub(super) struct OrganizationRow {
    id: String,
    subscription_plan_id: String,
    is_active: bool,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = AppError;

    fn try_from(row: OrganizationRow) -> Result<Self, Self::Error> {
        Ok(Organization::new(
            OrganizationId::new(row.id)?,
            PlanId::new(row.subscription_plan_id)?,
        )
        .with_active(row.is_active))
    }
}

#[derive(Debug, FromRow)]
pub(super) struct UserRow {
    id: String,
    organization_id: String,
    role_id: String,
    is_active: bool,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User::new(
            UserId::new(row.id)?,
            OrganizationId::new(row.organization_id)?,
            RoleId::new(row.role_id)?,
        )
        .with_active(row.is_active))
    }
}

pub(super) async fn fetch_modules(connection: &mut PgConnection) -> AppResult<Vec<Module>> {
    let rows = sqlx::query_as::<_, ModuleRow>(
        r#"
        SELECT id, display_name, category, available_actions, dependencies, is_core, display_order
        FROM modules
        ORDER BY id
        "#,
    )
    .fetch_all(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to list modules: {error}")))?;

    rows.into_iter().map(Module::try_from).collect()
}

pub(super) async fn fetch_user(
    connection: &mut PgConnection,
    user_id: &UserId,
) -> AppResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, organization_id, role_id, is_active
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id.as_str())
    .fetch_optional(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to find user '{user_id}': {error}")))?
    .map(User::try_from)
    .transpose()
}

pub(super) async fn fetch_organization(
    connection: &mut PgConnection,
    organization_id: &OrganizationId,
) -> AppResult<Option<Organization>> {
    sqlx::query_as::<_, OrganizationRow>(
        r#"
        SELECT id, subscription_plan_id, is_active
        FROM organizations
        WHERE id = $1
        "#,
    )
    .bind(organization_id.as_str())
    .fetch_optional(connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to find organization '{organization_id}': {error}"
        ))
    })?
    .map(Organization::try_from)
    .transpose()
}

pub(super) async fn fetch_role(
    connection: &mut PgConnection,
    role_id: &RoleId,
) -> AppResult<Option<Role>> {
    sqlx::query_as::<_, RoleRow>(
        r#"
        SELECT id, organization_id, permissions, is_active
        FROM roles
        WHERE id = $1
        "#,
    )
    .bind(role_id.as_str())
    .fetch_optional(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to find role '{role_id}': {error}")))?
    .map(Role::try_from)
    .transpose()
}

pub(super) async fn fetch_plan(
    connection: &mut PgConnection,
    plan_id: &PlanId,
) -> AppResult<Option<SubscriptionPlan>> {
    sqlx::query_as::<_, PlanRow>(
        r#"
        SELECT id, modules, max_users, is_active
        FROM subscription_plans
        WHERE id = $1
        "#,
    )
    .bind(plan_id.as_str())
    .fetch_optional(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to find plan '{plan_id}': {error}")))?
    .map(SubscriptionPlan::try_from)
    .transpose()
}

pub(super) fn action_names(actions: &ActionSet) -> Vec<String> {
    actions
        .iter()
        .map(|action| action.as_str().to_owned())
        .collect()
}
