use modgate_core::{ModuleId, RoleId};
use serde::{Deserialize, Serialize};

use crate::Action;

/// Category of a structural permission problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// A granted module lacks `view` on one of its transitive dependencies.
    MissingDependency,
    /// The module dependency relation contains a cycle.
    CircularDependency,
    /// A reference or action that cannot be honoured (dangling id, action
    /// outside `available_actions`, core module left without access).
    InvalidAction,
    /// A plan ceiling shrank below what active roles request.
    CeilingReduced,
}

impl ConflictType {
    /// Returns a stable storage value for this conflict type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingDependency => "missing_dependency",
            Self::CircularDependency => "circular_dependency",
            Self::InvalidAction => "invalid_action",
            Self::CeilingReduced => "ceiling_reduced",
        }
    }
}

/// Whether a conflict prevents a mutation from committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    /// Rejects the affected target.
    Blocking,
    /// Reported for audit and administration only.
    Informational,
}

/// Structural problem detected during validation or resolution.
///
/// Conflicts are data, not errors: callers decide whether to surface them
/// as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionConflict {
    /// Conflict category.
    pub conflict_type: ConflictType,
    /// Whether the conflict blocks a mutation.
    pub severity: ConflictSeverity,
    /// Module the conflict is about. For dangling references this is the
    /// unknown id as written.
    pub module_id: String,
    /// Action the conflict is about, when one applies.
    pub action: Option<Action>,
    /// Human readable explanation.
    pub description: String,
    /// Dependent module for `missing_dependency` conflicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_by: Option<ModuleId>,
    /// Cycle members starting at the smallest id, for `circular_dependency`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycle: Vec<ModuleId>,
    /// Active roles relying on a removed ceiling action.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_roles: Vec<RoleId>,
}

impl PermissionConflict {
    /// `module_id` lacks `view` although `required_by` is granted.
    #[must_use]
    pub fn missing_dependency(module_id: &ModuleId, required_by: &ModuleId) -> Self {
        Self {
            conflict_type: ConflictType::MissingDependency,
            severity: ConflictSeverity::Blocking,
            module_id: module_id.to_string(),
            action: Some(Action::View),
            description: format!(
                "module '{required_by}' requires 'view' on dependency '{module_id}'"
            ),
            required_by: Some(required_by.clone()),
            cycle: Vec::new(),
            affected_roles: Vec::new(),
        }
    }

    /// `required_by` declares a dependency on a module that does not exist.
    #[must_use]
    pub fn unknown_dependency(module_id: &ModuleId, required_by: &ModuleId) -> Self {
        Self {
            description: format!(
                "module '{required_by}' depends on unknown module '{module_id}'"
            ),
            action: None,
            ..Self::missing_dependency(module_id, required_by)
        }
    }

    /// Cycle in the dependency relation; `cycle` must start at its smallest id.
    #[must_use]
    pub fn circular_dependency(cycle: Vec<ModuleId>) -> Self {
        let module_id = cycle.first().map(ToString::to_string).unwrap_or_default();
        let path = cycle
            .iter()
            .chain(cycle.first())
            .map(ModuleId::as_str)
            .collect::<Vec<_>>()
            .join(" -> ");

        Self {
            conflict_type: ConflictType::CircularDependency,
            severity: ConflictSeverity::Blocking,
            module_id,
            action: None,
            description: format!("circular module dependency: {path}"),
            required_by: None,
            cycle,
            affected_roles: Vec::new(),
        }
    }

    /// Generic blocking `invalid_action` conflict.
    #[must_use]
    pub fn invalid_action(
        module_id: impl Into<String>,
        action: Option<Action>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            conflict_type: ConflictType::InvalidAction,
            severity: ConflictSeverity::Blocking,
            module_id: module_id.into(),
            action,
            description: description.into(),
            required_by: None,
            cycle: Vec::new(),
            affected_roles: Vec::new(),
        }
    }

    /// Informational notice that a plan no longer allows what roles request.
    #[must_use]
    pub fn ceiling_reduced(module_id: &ModuleId, action: Action, affected_roles: Vec<RoleId>) -> Self {
        Self {
            conflict_type: ConflictType::CeilingReduced,
            severity: ConflictSeverity::Informational,
            module_id: module_id.to_string(),
            action: Some(action),
            description: format!(
                "plan no longer allows '{action}' on '{module_id}'; {} active role(s) still request it",
                affected_roles.len()
            ),
            required_by: None,
            cycle: Vec::new(),
            affected_roles,
        }
    }

    /// Returns whether the conflict rejects a mutation.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity == ConflictSeverity::Blocking
    }
}
