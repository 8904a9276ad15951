//! # Health Check Handlers
//!
//! Unauthenticated liveness and readiness endpoints. Readiness requires a
//! reachable database with every bundled migration applied.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::database::connection::health_check;
use crate::database::MIGRATOR;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, ProbeResult>,
}

#[derive(Debug, Serialize)]
pub struct ProbeResult {
    detail: String,
    duration_ms: u64,
}

/// GET /health
pub async fn basic_health() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn applied_migrations(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// GET /ready
pub async fn readiness_probe(State(state): State<AppState>) -> ApiResult<Json<ReadinessResponse>> {
    debug!("Performing readiness probe");
    let mut checks = BTreeMap::new();

    let started = Instant::now();
    match health_check(&state.pool).await {
        Ok(true) => {}
        Ok(false) | Err(_) => {
            warn!("Datastore database is not reachable");
            return Err(ApiError::ServiceUnavailable);
        }
    }
    checks.insert(
        "database",
        ProbeResult {
            detail: "reachable".to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
        },
    );

    let started = Instant::now();
    let expected = MIGRATOR.iter().count() as i64;
    let applied = applied_migrations(&state.pool).await.unwrap_or(0);
    if applied < expected {
        warn!(applied, expected, "Datastore schema is behind; run migrate");
        return Err(ApiError::ServiceUnavailable);
    }
    checks.insert(
        "schema",
        ProbeResult {
            detail: format!("{applied} migrations applied"),
            duration_ms: started.elapsed().as_millis() as u64,
        },
    );

    Ok(Json(ReadinessResponse { status: "ready", checks }))
}
