use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{delete, get, post};
use modgate_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(
    app_state: AppState,
    cors_allowed_origin: Option<&str>,
) -> Result<Router, AppError> {
    let api_routes = Router::new()
        .route(
            "/api/users/{user_id}/effective-permissions",
            get(handlers::permissions::effective_permissions_handler),
        )
        .route(
            "/api/users/{user_id}/effective-permissions/{module_id}/{action}",
            get(handlers::permissions::check_permission_handler),
        )
        .route(
            "/api/modules",
            get(handlers::modules::list_modules_handler)
                .post(handlers::modules::create_module_handler),
        )
        .route(
            "/api/modules/validation",
            get(handlers::modules::validate_modules_handler),
        )
        .route(
            "/api/modules/{module_id}",
            delete(handlers::modules::remove_module_handler),
        )
        .route(
            "/api/bulk-updates",
            post(handlers::bulk_updates::bulk_update_handler),
        )
        .route(
            "/api/audit-log",
            get(handlers::audit::list_audit_log_handler),
        )
        .route_layer(from_fn(middleware::require_actor_for_mutations));

    let router = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(api_routes);

    let router = match cors_allowed_origin {
        Some(origin) => router.layer(cors::build_cors_layer(origin)?),
        None => router,
    };

    Ok(router
        .layer(TraceLayer::new_for_http())
        .with_state(app_state))
}
