//! # Datastore Web API
//!
//! Token-authenticated REST endpoints for projects and consumption data,
//! plus unauthenticated health probes and the collected static files.
//!
//! Error bodies use the `{"detail": "..."}` shape throughout.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::Router;
use tower_http::services::ServeDir;
use tracing::info;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

/// Create the web application with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let web = &state.config.web;
    let request_timeout = Duration::from_secs(web.timeout_seconds);
    let cors_enabled = web.cors_enabled;
    let static_url = web.static_url.trim_end_matches('/').to_string();
    let static_root = state.config.static_files.static_root.clone();

    let protected_routes = Router::new()
        .merge(routes::consumption_routes())
        .merge(routes::project_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_token,
        ));

    let mut router = Router::new()
        .merge(routes::health_routes())
        .merge(protected_routes);
    if !static_url.is_empty() {
        router = router.nest_service(&static_url, ServeDir::new(static_root));
    }

    let app = middleware::apply_middleware_stack(router, request_timeout, cors_enabled).with_state(state);

    info!(static_url = %static_url, "Web application created with all routes and middleware");
    app
}
