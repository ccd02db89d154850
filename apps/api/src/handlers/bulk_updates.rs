use axum::Json;
use axum::extract::{Extension, State};
use modgate_core::CallerIdentity;
use modgate_domain::BulkPermissionUpdate;

use crate::dto::{BulkUpdateRequest, BulkUpdateResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// Always answers `200` once the request is well formed; per-target failures
/// are reported in the body.
pub async fn bulk_update_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<CallerIdentity>,
    Json(payload): Json<BulkUpdateRequest>,
) -> ApiResult<Json<BulkUpdateResponse>> {
    let update = BulkPermissionUpdate::try_from(payload)?;
    let results = state.bulk_update_service.apply(&actor, update).await?;

    Ok(Json(BulkUpdateResponse::from(results)))
}
