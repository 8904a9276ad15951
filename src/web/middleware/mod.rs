//! # Web API Middleware
//!
//! Middleware stack for the web API: request ids, access logging, timeouts,
//! CORS and tracing. Token authentication is layered on the API routes only.

pub mod access_log;
pub mod auth;
pub mod request_id;

use std::time::Duration;

use axum::middleware;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::web::state::AppState;

/// Apply the middleware stack with the given per-request timeout
///
/// Layers run outermost first: tracing, CORS (when enabled), timeout, access
/// log, request id.
pub fn apply_middleware_stack(
    router: Router<AppState>,
    request_timeout: Duration,
    cors_enabled: bool,
) -> Router<AppState> {
    let router = router
        .layer(middleware::from_fn(request_id::add_request_id))
        .layer(middleware::from_fn(access_log::log_access))
        .layer(TimeoutLayer::new(request_timeout));

    let router = if cors_enabled {
        router.layer(create_cors_layer())
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}

fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
