use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use modgate_core::CallerIdentity;

use crate::dto::{
    CatalogChangeResponse, CreateModuleRequest, ModuleResponse, ModuleValidationResponse,
    RemoveModuleQuery,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_modules_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ModuleResponse>>> {
    let modules = state
        .module_catalog_service
        .list_modules()
        .await?
        .into_iter()
        .map(ModuleResponse::from)
        .collect();

    Ok(Json(modules))
}

pub async fn validate_modules_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<ModuleValidationResponse>> {
    let conflicts = state.module_catalog_service.validate_module_graph().await?;
    Ok(Json(ModuleValidationResponse::from(conflicts)))
}

/// Responds `201` when the module was committed and `409` with the blocking
/// conflicts when it was not.
pub async fn create_module_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<CallerIdentity>,
    Json(payload): Json<CreateModuleRequest>,
) -> ApiResult<(StatusCode, Json<CatalogChangeResponse>)> {
    let (module, reason) = payload.into_module()?;
    let outcome = state
        .module_catalog_service
        .add_module(&actor, module, reason.as_str())
        .await?;

    let status = if outcome.success {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    };
    Ok((status, Json(CatalogChangeResponse::from(outcome))))
}

pub async fn remove_module_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<CallerIdentity>,
    Path(module_id): Path<String>,
    Query(query): Query<RemoveModuleQuery>,
) -> ApiResult<(StatusCode, Json<CatalogChangeResponse>)> {
    let outcome = state
        .module_catalog_service
        .remove_module(&actor, module_id.as_str(), query.reason()?)
        .await?;

    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    Ok((status, Json(CatalogChangeResponse::from(outcome))))
}
