//! # Consumption Handlers
//!
//! `/datastore/consumption/` list/create and `/datastore/consumption/{id}/`
//! retrieve/update/destroy. Records are nested in every representation.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::models::{ConsumptionDetail, ConsumptionMetadata, NewConsumptionMetadata, Project};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

async fn check_project(state: &AppState, fields: &NewConsumptionMetadata) -> ApiResult<()> {
    if let Some(project_id) = fields.project_id {
        if Project::find_by_id(&state.pool, project_id).await?.is_none() {
            return Err(ApiError::bad_request(format!(
                "project: Invalid pk \"{project_id}\" - object does not exist."
            )));
        }
    }
    Ok(())
}

/// GET /datastore/consumption/
pub async fn list_consumption(State(state): State<AppState>) -> ApiResult<Json<Vec<ConsumptionDetail>>> {
    let mut details = Vec::new();
    for metadata in ConsumptionMetadata::list_all(&state.pool).await? {
        details.push(metadata.with_records(&state.pool).await?);
    }
    Ok(Json(details))
}

/// POST /datastore/consumption/
pub async fn create_consumption(
    State(state): State<AppState>,
    payload: Result<Json<NewConsumptionMetadata>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ConsumptionDetail>)> {
    let Json(fields) = payload?;
    check_project(&state, &fields).await?;

    let created = ConsumptionMetadata::create(&state.pool, &fields).await?;
    info!(
        consumption_metadata_id = created.metadata.id,
        records = created.records.len(),
        "Created consumption metadata"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /datastore/consumption/{id}/
pub async fn get_consumption(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ConsumptionDetail>> {
    let metadata = ConsumptionMetadata::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(metadata.with_records(&state.pool).await?))
}

/// PUT /datastore/consumption/{id}/
pub async fn update_consumption(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<NewConsumptionMetadata>, JsonRejection>,
) -> ApiResult<Json<ConsumptionDetail>> {
    let Json(fields) = payload?;
    check_project(&state, &fields).await?;

    let updated = ConsumptionMetadata::update(&state.pool, id, &fields)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

/// DELETE /datastore/consumption/{id}/
pub async fn delete_consumption(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    if ConsumptionMetadata::delete(&state.pool, id).await? {
        info!(consumption_metadata_id = id, "Deleted consumption metadata");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
