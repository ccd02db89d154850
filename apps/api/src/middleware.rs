use axum::extract::Request;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use modgate_core::{AppError, CallerIdentity};

use crate::error::ApiResult;

/// Header carrying the administrator recorded as `performed_by`.
pub const ACTOR_HEADER: &str = "x-modgate-actor";

/// Resolves the caller identity of state-changing requests.
///
/// The header is trusted as sent; authenticating it belongs to the gateway in
/// front of this service.
pub async fn require_actor_for_mutations(mut request: Request, next: Next) -> ApiResult<Response> {
    if is_state_changing_method(request.method()) {
        let subject = request
            .headers()
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("{ACTOR_HEADER} header is required"))
            })?;

        let actor = CallerIdentity::new(subject)?;
        request.extensions_mut().insert(actor);
    }

    Ok(next.run(request).await)
}

fn is_state_changing_method(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
