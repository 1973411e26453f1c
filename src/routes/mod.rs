// ============================================================================
// Axum Routes Module
// ============================================================================
//
// - mod.rs: router assembly, `protect` for host application routes
// - csrf.rs: token issuance and diagnostic check endpoints
// - health.rs: health check
// - middleware.rs: request logging, CSRF protection
//
// ============================================================================

pub mod csrf;
pub mod health;
pub mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

/// Create the main application router
///
/// `app_routes` are the host application's handlers; they are merged in and
/// protected by the same gate as the built-in routes.
pub fn create_router(app_context: Arc<AppContext>, app_routes: Router) -> Router {
    let builtin: Router = Router::new()
        .route("/health", get(health::health_check))
        .route("/csrf/token", get(csrf::get_csrf_token))
        .route("/csrf/check", post(csrf::check_csrf))
        .with_state(app_context.clone());

    protect(builtin.merge(app_routes), app_context).layer(
        ServiceBuilder::new()
            // Tracing layer (outermost - runs first)
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(middleware::request_logging))
            .into_inner(),
    )
}

/// Put every route of `router` behind the CSRF gate
///
/// Applied as a route layer so the matched route template is visible to the
/// exemption lookup. Must be called after all routes are added.
pub fn protect<S>(router: Router<S>, app_context: Arc<AppContext>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(axum::middleware::from_fn_with_state(
        app_context,
        middleware::csrf_protection,
    ))
}
