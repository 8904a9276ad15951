//! # Project Handlers
//!
//! `/datastore/project/` list/create and `/datastore/project/{id}/`
//! retrieve/update/destroy.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::models::{NewProject, Project, ProjectOwner};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

async fn validate(state: &AppState, fields: &NewProject) -> ApiResult<()> {
    fields.validate().map_err(ApiError::bad_request)?;
    if ProjectOwner::find_by_id(&state.pool, fields.project_owner_id)
        .await?
        .is_none()
    {
        return Err(ApiError::bad_request(format!(
            "project_owner: Invalid pk \"{}\" - object does not exist.",
            fields.project_owner_id
        )));
    }
    Ok(())
}

/// GET /datastore/project/
pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(Project::list_all(&state.pool).await?))
}

/// POST /datastore/project/
pub async fn create_project(
    State(state): State<AppState>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let Json(fields) = payload?;
    validate(&state, &fields).await?;

    let project = Project::create(&state.pool, &fields).await?;
    info!(id = project.id, project_id = %project.project_id, "Created project");
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /datastore/project/{id}/
pub async fn get_project(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Project>> {
    let project = Project::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(project))
}

/// PUT /datastore/project/{id}/
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> ApiResult<Json<Project>> {
    let Json(fields) = payload?;
    validate(&state, &fields).await?;

    let project = Project::update(&state.pool, id, &fields)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(project))
}

/// DELETE /datastore/project/{id}/
pub async fn delete_project(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    if Project::delete(&state.pool, id).await? {
        info!(id = id, "Deleted project");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
