//! Datastore Web API Routes
//!
//! Route definitions grouped by resource. The `/datastore` routes are wrapped
//! in token authentication by `create_app`; health routes stay public.

use axum::routing::get;
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

/// Liveness and readiness probes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/ready", get(handlers::health::readiness_probe))
}

/// Consumption metadata with nested records
pub fn consumption_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/datastore/consumption/",
            get(handlers::consumption::list_consumption).post(handlers::consumption::create_consumption),
        )
        .route(
            "/datastore/consumption/:id/",
            get(handlers::consumption::get_consumption)
                .put(handlers::consumption::update_consumption)
                .delete(handlers::consumption::delete_consumption),
        )
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/datastore/project/",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/datastore/project/:id/",
            get(handlers::projects::get_project)
                .put(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )
}
