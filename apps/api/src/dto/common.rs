use modgate_domain::{ConflictSeverity, ConflictType, PermissionConflict};
use serde::Serialize;

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
    pub cache: &'static str,
}

/// API representation of a structural permission problem.
#[derive(Debug, Serialize)]
pub struct PermissionConflictResponse {
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub module_id: String,
    pub action: Option<&'static str>,
    pub description: String,
    pub required_by: Option<String>,
    pub cycle: Vec<String>,
    pub affected_roles: Vec<String>,
}

impl From<PermissionConflict> for PermissionConflictResponse {
    fn from(conflict: PermissionConflict) -> Self {
        Self {
            conflict_type: conflict.conflict_type,
            severity: conflict.severity,
            module_id: conflict.module_id,
            action: conflict.action.map(|action| action.as_str()),
            description: conflict.description,
            required_by: conflict
                .required_by
                .map(|module_id| module_id.as_str().to_owned()),
            cycle: conflict
                .cycle
                .iter()
                .map(|module_id| module_id.as_str().to_owned())
                .collect(),
            affected_roles: conflict
                .affected_roles
                .iter()
                .map(|role_id| role_id.as_str().to_owned())
                .collect(),
        }
    }
}

pub(super) fn conflict_responses(
    conflicts: Vec<PermissionConflict>,
) -> Vec<PermissionConflictResponse> {
    conflicts
        .into_iter()
        .map(PermissionConflictResponse::from)
        .collect()
}

pub(super) fn action_names<'a>(
    actions: impl IntoIterator<Item = &'a modgate_domain::Action>,
) -> Vec<&'static str> {
    actions.into_iter().map(|action| action.as_str()).collect()
}
