//! # Datastore Configuration System
//!
//! YAML-based configuration for the datastore service, its container
//! entrypoint and the meter evaluation engine.
//!
//! ## Architecture
//!
//! - **Single Source of Truth**: `config/datastore.yaml`
//! - **Environment Awareness**: top-level `development`/`test`/`production`
//!   sections are merged over the base values
//! - **Explicit Validation**: invalid values fail loading instead of being patched
//!
//! ## Usage
//!
//! ```rust,no_run
//! use oeem_datastore::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let bind = &manager.config().web.bind_address;
//! let workers = manager.config().web.workers;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring datastore.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Database connection and pooling configuration
    pub database: DatabaseConfig,

    /// HTTP server settings
    pub web: WebConfig,

    /// Container entrypoint paths and server handoff parameters
    pub entrypoint: EntrypointConfig,

    /// Static asset collection
    pub static_files: StaticFilesConfig,

    /// Savings evaluation settings
    pub meter: MeterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://postgres@localhost/oeem_datastore_development".to_string(),
            pool: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    /// Runtime worker threads serving requests
    pub workers: usize,
    /// Per-request timeout
    pub timeout_seconds: u64,
    pub static_url: String,
    pub cors_enabled: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            workers: 3,
            timeout_seconds: 180,
            static_url: "/static".to_string(),
            cors_enabled: true,
        }
    }
}

/// Paths and handoff parameters used by `oeem-datastore start`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EntrypointConfig {
    /// File of `export KEY=VALUE` lines sourced before anything else
    pub env_file: PathBuf,
    /// Presence of this variable enables migrations and static collection
    pub setup_var: String,
    /// Directories for the (disabled) background worker
    pub worker_dirs: Vec<PathBuf>,
    pub log_dir: PathBuf,
    pub log_files: Vec<PathBuf>,
    pub server_log_file: PathBuf,
    pub access_log_file: PathBuf,
    pub log_level: String,
}

impl Default for EntrypointConfig {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from("env.sh"),
            setup_var: "SETUP".to_string(),
            worker_dirs: vec![
                PathBuf::from("/var/run/celery"),
                PathBuf::from("/var/log/celery"),
            ],
            log_dir: PathBuf::from("/srv/logs"),
            log_files: vec![
                PathBuf::from("/srv/logs/gunicorn.log"),
                PathBuf::from("/srv/logs/access.log"),
                PathBuf::from("/srv/logs/celery.log"),
            ],
            server_log_file: PathBuf::from("/srv/logs/gunicorn.log"),
            access_log_file: PathBuf::from("/srv/logs/access.log"),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub source_dirs: Vec<PathBuf>,
    pub static_root: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            source_dirs: vec![PathBuf::from("static")],
            static_root: PathBuf::from("/srv/static"),
        }
    }
}

/// Inclusive balance temperature search range in degrees Fahrenheit
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BalanceTemperatureRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl BalanceTemperatureRange {
    /// Candidate balance temperatures from `min` to `max`
    pub fn candidates(&self) -> Vec<f64> {
        let mut values = Vec::new();
        if self.step <= 0.0 {
            return vec![self.min];
        }
        let mut current = self.min;
        while current <= self.max + 1e-9 {
            values.push(current);
            current += self.step;
        }
        values
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Meter runs with a CVRMSE at or above this value are not valid
    pub cvrmse_threshold: f64,
    pub heating_balance_temperature: BalanceTemperatureRange,
    pub cooling_balance_temperature: BalanceTemperatureRange,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            cvrmse_threshold: 20.0,
            heating_balance_temperature: BalanceTemperatureRange {
                min: 55.0,
                max: 70.0,
                step: 1.0,
            },
            cooling_balance_temperature: BalanceTemperatureRange {
                min: 65.0,
                max: 80.0,
                step: 1.0,
            },
        }
    }
}

impl DatastoreConfig {
    /// Reject values the server or entrypoint cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "database.url",
                "",
                "database url cannot be empty",
            ));
        }
        if self.database.pool == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.pool",
                "0",
                "pool size must be at least 1",
            ));
        }
        if self.web.bind_address.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "web.bind_address",
                "",
                "bind address cannot be empty",
            ));
        }
        if self.web.workers == 0 {
            return Err(ConfigurationError::invalid_value(
                "web.workers",
                "0",
                "must be at least 1",
            ));
        }
        if self.web.timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "web.timeout_seconds",
                "0",
                "must be at least 1",
            ));
        }
        for (field, range) in [
            (
                "meter.heating_balance_temperature",
                &self.meter.heating_balance_temperature,
            ),
            (
                "meter.cooling_balance_temperature",
                &self.meter.cooling_balance_temperature,
            ),
        ] {
            if range.min > range.max {
                return Err(ConfigurationError::invalid_value(
                    field,
                    format!("{}..{}", range.min, range.max),
                    "min must not exceed max",
                ));
            }
        }
        Ok(())
    }
}
