use modgate_application::CatalogChangeOutcome;
use modgate_core::{AppError, AppResult};
use modgate_domain::{Action, ActionSet, Module, ModuleDefinition, PermissionConflict};
use serde::{Deserialize, Serialize};

use super::PermissionConflictResponse;
use super::common::{action_names, conflict_responses};

/// API representation of a catalog module.
#[derive(Debug, Serialize)]
pub struct ModuleResponse {
    pub id: String,
    pub display_name: String,
    pub category: String,
    pub available_actions: Vec<&'static str>,
    pub dependencies: Vec<String>,
    pub is_core: bool,
    pub order: i32,
}

impl From<Module> for ModuleResponse {
    fn from(module: Module) -> Self {
        Self {
            id: module.id().as_str().to_owned(),
            display_name: module.display_name().as_str().to_owned(),
            category: module.category().to_owned(),
            available_actions: action_names(module.available_actions()),
            dependencies: module
                .dependencies()
                .iter()
                .map(|module_id| module_id.as_str().to_owned())
                .collect(),
            is_core: module.is_core(),
            order: module.order(),
        }
    }
}

/// Incoming payload for adding a module to the catalog.
#[derive(Debug, Deserialize)]
pub struct CreateModuleRequest {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub category: String,
    pub available_actions: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub is_core: bool,
    #[serde(default)]
    pub order: i32,
    pub reason: String,
}

impl CreateModuleRequest {
    /// Splits the request into a validated module and the audit reason.
    pub fn into_module(self) -> AppResult<(Module, String)> {
        let available_actions = self
            .available_actions
            .iter()
            .map(|value| Action::from_transport(value))
            .collect::<AppResult<ActionSet>>()?;

        let module = Module::new(ModuleDefinition {
            id: self.id,
            display_name: self.display_name,
            category: self.category,
            available_actions,
            dependencies: self.dependencies.into_iter().collect(),
            is_core: self.is_core,
            order: self.order,
        })?;

        Ok((module, self.reason))
    }
}

/// Query string of a module removal.
#[derive(Debug, Default, Deserialize)]
pub struct RemoveModuleQuery {
    pub reason: Option<String>,
}

impl RemoveModuleQuery {
    pub fn reason(&self) -> AppResult<&str> {
        self.reason
            .as_deref()
            .ok_or_else(|| AppError::Validation("reason query parameter is required".to_owned()))
    }
}

/// Outcome of a catalog mutation.
#[derive(Debug, Serialize)]
pub struct CatalogChangeResponse {
    pub success: bool,
    pub conflicts: Vec<PermissionConflictResponse>,
    pub audit_record_id: Option<String>,
    pub error: Option<String>,
}

impl From<CatalogChangeOutcome> for CatalogChangeResponse {
    fn from(outcome: CatalogChangeOutcome) -> Self {
        Self {
            success: outcome.success,
            conflicts: conflict_responses(outcome.conflicts),
            audit_record_id: outcome.audit_record_id.map(|id| id.to_string()),
            error: outcome.error,
        }
    }
}

/// Result of validating the stored module graph.
#[derive(Debug, Serialize)]
pub struct ModuleValidationResponse {
    pub valid: bool,
    pub conflicts: Vec<PermissionConflictResponse>,
}

impl From<Vec<PermissionConflict>> for ModuleValidationResponse {
    fn from(conflicts: Vec<PermissionConflict>) -> Self {
        Self {
            valid: conflicts.is_empty(),
            conflicts: conflict_responses(conflicts),
        }
    }
}
