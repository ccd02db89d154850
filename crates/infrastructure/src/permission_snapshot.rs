use std::collections::BTreeSet;
use std::path::Path;

use modgate_core::{AppError, AppResult};
use modgate_domain::{Module, ModuleGraph, Organization, Role, SubscriptionPlan, User};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Complete permission dataset used to seed a store.
///
/// Records reference each other by id only. References to plans, roles, or
/// organizations that are absent from the snapshot are kept; resolution
/// treats them as dangling and fails closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionSnapshot {
    /// Module catalog.
    #[serde(default)]
    pub modules: Vec<Module>,
    /// Subscription plans.
    #[serde(default)]
    pub plans: Vec<SubscriptionPlan>,
    /// Organization roles.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Tenant organizations.
    #[serde(default)]
    pub organizations: Vec<Organization>,
    /// Users.
    #[serde(default)]
    pub users: Vec<User>,
}

impl PermissionSnapshot {
    /// Parses and validates a JSON snapshot.
    pub fn from_json(payload: &str) -> AppResult<Self> {
        let snapshot: Self = serde_json::from_str(payload)
            .map_err(|error| AppError::Validation(format!("invalid permission snapshot: {error}")))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Reads a JSON snapshot from disk.
    pub async fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let payload = tokio::fs::read_to_string(path).await.map_err(|error| {
            AppError::Validation(format!(
                "failed to read permission snapshot '{}': {error}",
                path.display()
            ))
        })?;

        let snapshot = Self::from_json(payload.as_str())?;
        info!(
            path = %path.display(),
            modules = snapshot.modules.len(),
            plans = snapshot.plans.len(),
            roles = snapshot.roles.len(),
            organizations = snapshot.organizations.len(),
            users = snapshot.users.len(),
            "permission snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Rejects duplicate ids. Module ids are checked by the graph itself.
    pub fn validate(&self) -> AppResult<()> {
        ModuleGraph::new(self.modules.iter().cloned())?;
        ensure_unique("plan", self.plans.iter().map(|plan| plan.id().as_str()))?;
        ensure_unique("role", self.roles.iter().map(|role| role.id().as_str()))?;
        ensure_unique(
            "organization",
            self.organizations
                .iter()
                .map(|organization| organization.id().as_str()),
        )?;
        ensure_unique("user", self.users.iter().map(|user| user.id().as_str()))
    }
}

fn ensure_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> AppResult<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(AppError::Validation(format!(
                "duplicate {kind} id '{id}' in permission snapshot"
            )));
        }
    }

    Ok(())
}
