use axum::Json;
use axum::extract::{Query, State};

use crate::dto::{AuditLogQuery, AuditRecordResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<Vec<AuditRecordResponse>>> {
    let mut cursor = state.audit_log_service.query(query.filter()?)?;
    let mut records = Vec::new();

    while query.limit.is_none_or(|limit| records.len() < limit) {
        let Some(record) = cursor.next().await? else {
            break;
        };
        records.push(AuditRecordResponse::from(record));
    }

    Ok(Json(records))
}
