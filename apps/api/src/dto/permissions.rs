use modgate_domain::{
    Action, EffectivePermission, EffectivePermissionSet, PermissionCheck, PermissionState,
    RestrictedBy,
};
use serde::Serialize;

use super::PermissionConflictResponse;
use super::common::conflict_responses;

/// One granted or restricted `(module, action)` entry.
#[derive(Debug, Serialize)]
pub struct EffectivePermissionResponse {
    pub module_id: String,
    pub action: &'static str,
    pub granted: bool,
    pub restricted_by: RestrictedBy,
}

impl From<EffectivePermission> for EffectivePermissionResponse {
    fn from(entry: EffectivePermission) -> Self {
        Self {
            module_id: entry.module_id,
            action: entry.action.as_str(),
            granted: entry.granted,
            restricted_by: entry.restricted_by,
        }
    }
}

/// Effective permissions of one user.
#[derive(Debug, Serialize)]
pub struct EffectivePermissionsResponse {
    pub user_id: String,
    pub permissions: Vec<EffectivePermissionResponse>,
    pub conflicts: Vec<PermissionConflictResponse>,
}

impl EffectivePermissionsResponse {
    #[must_use]
    pub fn new(user_id: String, set: EffectivePermissionSet) -> Self {
        Self {
            user_id,
            permissions: set
                .permissions
                .into_iter()
                .map(EffectivePermissionResponse::from)
                .collect(),
            conflicts: conflict_responses(set.conflicts),
        }
    }
}

/// Answer to a single permission check.
#[derive(Debug, Serialize)]
pub struct PermissionCheckResponse {
    pub user_id: String,
    pub module_id: String,
    pub action: &'static str,
    pub granted: bool,
    pub restricted_by: RestrictedBy,
    pub state: PermissionState,
}

impl PermissionCheckResponse {
    #[must_use]
    pub fn new(user_id: String, module_id: String, action: Action, check: PermissionCheck) -> Self {
        Self {
            user_id,
            module_id,
            action: action.as_str(),
            granted: check.granted,
            restricted_by: check.restricted_by,
            state: check.state,
        }
    }
}
