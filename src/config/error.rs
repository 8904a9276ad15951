//! Configuration Error Types
//!
//! Errors raised while locating, parsing, merging and validating the datastore
//! configuration file.

use std::path::PathBuf;
use thiserror::Error;

/// Why `config/datastore.yaml` could not become a [`DatastoreConfig`](super::DatastoreConfig)
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No datastore configuration file among {searched_paths:?}")]
    ConfigFileNotFound { searched_paths: Vec<PathBuf> },

    #[error("Configuration file '{file_path}' is not valid YAML: {error}")]
    InvalidYaml { file_path: String, error: String },

    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// An environment section does not line up with the base document
    #[error("Cannot apply environment section: {error}")]
    ConfigMergeError { error: String },

    #[error("Cannot read configuration file '{file_path}': {error}")]
    FileReadError { file_path: String, error: String },
}

impl ConfigurationError {
    pub fn config_file_not_found(searched_paths: Vec<PathBuf>) -> Self {
        Self::ConfigFileNotFound { searched_paths }
    }

    pub fn invalid_yaml(file_path: impl Into<String>, error: impl ToString) -> Self {
        Self::InvalidYaml {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    pub fn merge_error(error: impl Into<String>) -> Self {
        Self::ConfigMergeError {
            error: error.into(),
        }
    }

    pub fn file_read_error(file_path: impl Into<String>, error: impl ToString) -> Self {
        Self::FileReadError {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
