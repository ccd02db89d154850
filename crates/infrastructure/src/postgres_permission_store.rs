use async_trait::async_trait;
use modgate_application::{AccessRecords, PermissionStore};
use modgate_core::{AppError, AppResult, OrganizationId, PlanId, RoleId, UserId};
use modgate_domain::{Module, ModuleGraph, Organization, PermissionMap, Role, SubscriptionPlan};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::PermissionSnapshot;

mod rows;

use rows::{
    OrganizationRow, RoleRow, action_names, fetch_modules, fetch_organization, fetch_plan,
    fetch_role, fetch_user,
};

/// PostgreSQL-backed permission store.
#[derive(Clone)]
pub struct PostgresPermissionStore {
    pool: PgPool,
}

impl PostgresPermissionStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts every record of a snapshot in one transaction.
    pub async fn import_snapshot(&self, snapshot: &PermissionSnapshot) -> AppResult<()> {
        snapshot.validate()?;

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Unavailable(format!("failed to begin transaction: {error}"))
        })?;

        for module in &snapshot.modules {
            upsert_module(&mut transaction, module).await?;
        }

        for plan in &snapshot.plans {
            let max_users = plan
                .max_users()
                .map(i32::try_from)
                .transpose()
                .map_err(|error| {
                    AppError::Validation(format!(
                        "max_users of plan '{}' is out of range: {error}",
                        plan.id()
                    ))
                })?;

            sqlx::query(
                r#"
                INSERT INTO subscription_plans (id, modules, max_users, is_active)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET modules = EXCLUDED.modules,
                    max_users = EXCLUDED.max_users,
                    is_active = EXCLUDED.is_active
                "#,
            )
            .bind(plan.id().as_str())
            .bind(Json(plan.modules()))
            .bind(max_users)
            .bind(plan.is_active())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to import plan '{}': {error}", plan.id()))
            })?;
        }

        for organization in &snapshot.organizations {
            sqlx::query(
                r#"
                INSERT INTO organizations (id, subscription_plan_id, is_active)
                VALUES ($1, $2, $3)
                ON CONFLICT (id) DO UPDATE
                SET subscription_plan_id = EXCLUDED.subscription_plan_id,
                    is_active = EXCLUDED.is_active
                "#,
            )
            .bind(organization.id().as_str())
            .bind(organization.subscription_plan_id().as_str())
            .bind(organization.is_active())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to import organization '{}': {error}",
                    organization.id()
                ))
            })?;
        }

        for role in &snapshot.roles {
            sqlx::query(
                r#"
                INSERT INTO roles (id, organization_id, permissions, is_active)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET organization_id = EXCLUDED.organization_id,
                    permissions = EXCLUDED.permissions,
                    is_active = EXCLUDED.is_active
                "#,
            )
            .bind(role.id().as_str())
            .bind(role.organization_id().as_str())
            .bind(Json(role.permissions()))
            .bind(role.is_active())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to import role '{}': {error}", role.id()))
            })?;
        }

        for user in &snapshot.users {
            sqlx::query(
                r#"
                INSERT INTO users (id, organization_id, role_id, is_active)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET organization_id = EXCLUDED.organization_id,
                    role_id = EXCLUDED.role_id,
                    is_active = EXCLUDED.is_active
                "#,
            )
            .bind(user.id().as_str())
            .bind(user.organization_id().as_str())
            .bind(user.role_id().as_str())
            .bind(user.is_active())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to import user '{}': {error}", user.id()))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit snapshot import: {error}"))
        })?;

        info!(
            modules = snapshot.modules.len(),
            roles = snapshot.roles.len(),
            users = snapshot.users.len(),
            "permission snapshot imported into postgres"
        );
        Ok(())
    }
}

async fn upsert_module(connection: &mut PgConnection, module: &Module) -> AppResult<()> {
    let dependencies: Vec<String> = module
        .dependencies()
        .iter()
        .map(|module_id| module_id.as_str().to_owned())
        .collect();

    sqlx::query(
        r#"
        INSERT INTO modules (
            id,
            display_name,
            category,
            available_actions,
            dependencies,
            is_core,
            display_order
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE
        SET display_name = EXCLUDED.display_name,
            category = EXCLUDED.category,
            available_actions = EXCLUDED.available_actions,
            dependencies = EXCLUDED.dependencies,
            is_core = EXCLUDED.is_core,
            display_order = EXCLUDED.display_order
        "#,
    )
    .bind(module.id().as_str())
    .bind(module.display_name().as_str())
    .bind(module.category())
    .bind(action_names(module.available_actions()))
    .bind(dependencies)
    .bind(module.is_core())
    .bind(module.order())
    .execute(connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!("failed to save module '{}': {error}", module.id()))
    })?;

    Ok(())
}

#[async_trait]
impl PermissionStore for PostgresPermissionStore {
    async fn list_modules(&self) -> AppResult<Vec<Module>> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Unavailable(format!("failed to acquire connection: {error}"))
        })?;

        fetch_modules(&mut connection).await
    }

    async fn save_module(&self, module: Module) -> AppResult<()> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Unavailable(format!("failed to acquire connection: {error}"))
        })?;

        upsert_module(&mut connection, &module).await
    }

    async fn delete_module(&self, module_id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(module_id)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete module '{module_id}': {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "module '{module_id}' does not exist"
            )));
        }

        Ok(())
    }

    async fn load_access_records(&self, user_id: &UserId) -> AppResult<AccessRecords> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Unavailable(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to open snapshot transaction: {error}"))
            })?;

        let graph = ModuleGraph::new(fetch_modules(&mut transaction).await?)?;
        let user = fetch_user(&mut transaction, user_id).await?;

        let (organization, role) = match &user {
            Some(user) => (
                fetch_organization(&mut transaction, user.organization_id()).await?,
                fetch_role(&mut transaction, user.role_id()).await?,
            ),
            None => (None, None),
        };

        let plan = match &organization {
            Some(organization) => {
                fetch_plan(&mut transaction, organization.subscription_plan_id()).await?
            }
            None => None,
        };

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to close snapshot transaction: {error}"))
        })?;

        Ok(AccessRecords {
            graph,
            user,
            organization,
            role,
            plan,
        })
    }

    async fn find_plan(&self, plan_id: &PlanId) -> AppResult<Option<SubscriptionPlan>> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Unavailable(format!("failed to acquire connection: {error}"))
        })?;

        fetch_plan(&mut connection, plan_id).await
    }

    async fn find_role(&self, role_id: &RoleId) -> AppResult<Option<Role>> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Unavailable(format!("failed to acquire connection: {error}"))
        })?;

        fetch_role(&mut connection, role_id).await
    }

    async fn list_organizations_for_plan(
        &self,
        plan_id: &PlanId,
    ) -> AppResult<Vec<Organization>> {
        let rows = sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT id, subscription_plan_id, is_active
            FROM organizations
            WHERE subscription_plan_id = $1
            ORDER BY id
            "#,
        )
        .bind(plan_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list organizations for plan '{plan_id}': {error}"
            ))
        })?;

        rows.into_iter().map(Organization::try_from).collect()
    }

    async fn list_roles_for_plan(&self, plan_id: &PlanId) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT roles.id, roles.organization_id, roles.permissions, roles.is_active
            FROM roles
            INNER JOIN organizations ON organizations.id = roles.organization_id
            WHERE organizations.subscription_plan_id = $1
            ORDER BY roles.id
            "#,
        )
        .bind(plan_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list roles for plan '{plan_id}': {error}"
            ))
        })?;

        rows.into_iter().map(Role::try_from).collect()
    }

    async fn save_plan_modules(&self, plan_id: &PlanId, modules: &PermissionMap) -> AppResult<()> {
        let result = sqlx::query("UPDATE subscription_plans SET modules = $2 WHERE id = $1")
            .bind(plan_id.as_str())
            .bind(Json(modules))
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to save plan '{plan_id}': {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("plan '{plan_id}' does not exist")));
        }

        Ok(())
    }

    async fn save_role_permissions(
        &self,
        role_id: &RoleId,
        permissions: &PermissionMap,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE roles SET permissions = $2 WHERE id = $1")
            .bind(role_id.as_str())
            .bind(Json(permissions))
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to save role '{role_id}': {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}' does not exist")));
        }

        Ok(())
    }
}
