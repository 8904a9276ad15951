//! # Web API Error Types
//!
//! Errors returned by the HTTP API and their response conversions. Bodies use
//! the `{"detail": "..."}` shape API clients of the datastore expect.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::DatastoreError;
use crate::logging::log_error;

pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";
pub const NOT_FOUND: &str = "Not found.";

/// Web API specific errors with HTTP status code mappings
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found.")]
    NotFound,

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("{message}")]
    BadRequest { message: String },

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,

    #[error("Database operation failed: {operation}")]
    DatabaseError { operation: String },

    #[error("A server error occurred.")]
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn database_error(operation: impl Into<String>) -> Self {
        Self::DatabaseError {
            operation: operation.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DatabaseError { .. } | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log_error("web", "request", &self.to_string(), status.canonical_reason());
        }

        // Database failures are logged above; clients get a generic message
        let detail = match &self {
            ApiError::DatabaseError { .. } => ApiError::Internal.to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            sqlx::Error::PoolTimedOut => ApiError::ServiceUnavailable,
            sqlx::Error::Database(db) => ApiError::database_error(db.message().to_string()),
            other => ApiError::database_error(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<DatastoreError> for ApiError {
    fn from(err: DatastoreError) -> Self {
        match err {
            DatastoreError::Database(e) => e.into(),
            DatastoreError::Validation(message) => ApiError::bad_request(message),
            DatastoreError::NotFound { .. } => ApiError::NotFound,
            other => ApiError::database_error(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
