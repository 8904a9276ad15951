//! # Datastore Errors
//!
//! Crate-wide error type. Web handlers translate these into [`crate::web::errors::ApiError`].

use thiserror::Error;

use crate::config::ConfigurationError;

#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Meter error: {0}")]
    Meter(String),

    #[error("Weather error: {0}")]
    Weather(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Entrypoint error: {0}")]
    Entrypoint(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl DatastoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DatastoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DatastoreError::not_found("Project", 42);
        assert_eq!(err.to_string(), "Project 42 not found");

        let err = DatastoreError::io(
            "/srv/logs/gunicorn.log",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().starts_with("I/O error on /srv/logs/gunicorn.log"));
    }
}
