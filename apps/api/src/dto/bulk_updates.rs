use modgate_core::{AppError, AppResult, ModuleId};
use modgate_domain::{Action, ActionSet, BulkPermissionUpdate, BulkTargetResult, ModuleUpdate};
use serde::{Deserialize, Serialize};

use super::PermissionConflictResponse;
use super::common::conflict_responses;

/// One module change inside a bulk update request.
#[derive(Debug, Deserialize)]
pub struct ModuleUpdateRequest {
    pub module_id: String,
    pub actions: Vec<String>,
    pub operation: String,
}

/// Incoming payload for a bulk permission update.
#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub target_type: String,
    pub target_ids: Vec<String>,
    pub module_updates: Vec<ModuleUpdateRequest>,
    pub reason: String,
}

impl TryFrom<BulkUpdateRequest> for BulkPermissionUpdate {
    type Error = AppError;

    fn try_from(request: BulkUpdateRequest) -> Result<Self, Self::Error> {
        let module_updates = request
            .module_updates
            .into_iter()
            .map(|update| -> AppResult<ModuleUpdate> {
                Ok(ModuleUpdate {
                    module_id: ModuleId::new(update.module_id)?,
                    actions: update
                        .actions
                        .iter()
                        .map(|value| Action::from_transport(value))
                        .collect::<AppResult<ActionSet>>()?,
                    operation: update.operation.parse()?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            target_type: request.target_type.parse()?,
            target_ids: request.target_ids,
            module_updates,
            reason: request.reason,
        })
    }
}

/// Outcome of one bulk update target.
#[derive(Debug, Serialize)]
pub struct BulkTargetResultResponse {
    pub target_id: String,
    pub success: bool,
    pub conflicts: Vec<PermissionConflictResponse>,
    pub error: Option<String>,
    pub audit_record_id: Option<String>,
}

impl From<BulkTargetResult> for BulkTargetResultResponse {
    fn from(result: BulkTargetResult) -> Self {
        Self {
            target_id: result.target_id,
            success: result.success,
            conflicts: conflict_responses(result.conflicts),
            error: result.error,
            audit_record_id: result.audit_record_id.map(|id| id.to_string()),
        }
    }
}

/// Per-target results of a bulk update, in request order.
#[derive(Debug, Serialize)]
pub struct BulkUpdateResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkTargetResultResponse>,
}

impl From<Vec<BulkTargetResult>> for BulkUpdateResponse {
    fn from(results: Vec<BulkTargetResult>) -> Self {
        let succeeded = results.iter().filter(|result| result.success).count();

        Self {
            succeeded,
            failed: results.len() - succeeded,
            results: results
                .into_iter()
                .map(BulkTargetResultResponse::from)
                .collect(),
        }
    }
}
