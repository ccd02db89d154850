use axum::Json;
use axum::extract::{Path, State};
use modgate_core::UserId;
use modgate_domain::Action;

use crate::dto::{EffectivePermissionsResponse, PermissionCheckResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn effective_permissions_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<EffectivePermissionsResponse>> {
    let user_id = UserId::new(user_id)?;
    let permissions = state
        .permission_resolution_service
        .resolve_effective_permissions(&user_id)
        .await?;

    Ok(Json(EffectivePermissionsResponse::new(
        user_id.as_str().to_owned(),
        permissions,
    )))
}

pub async fn check_permission_handler(
    State(state): State<AppState>,
    Path((user_id, module_id, action)): Path<(String, String, String)>,
) -> ApiResult<Json<PermissionCheckResponse>> {
    let user_id = UserId::new(user_id)?;
    let action = Action::from_transport(action.as_str())?;
    let check = state
        .permission_resolution_service
        .check_permission(&user_id, module_id.as_str(), action)
        .await?;

    Ok(Json(PermissionCheckResponse::new(
        user_id.as_str().to_owned(),
        module_id,
        action,
        check,
    )))
}
