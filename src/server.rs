//! # Application Server
//!
//! Runs the web API on a multi-threaded tokio runtime. `workers` is the number
//! of runtime worker threads and `timeout_seconds` the per-request timeout.
//!
//! [`ServerOptions::to_args`] renders the options back into `serve` arguments,
//! which is how the container entrypoint builds its handoff command line.

use std::path::PathBuf;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use crate::config::DatastoreConfig;
use crate::database::DatabaseConnection;
use crate::error::{DatastoreError, Result};
use crate::logging::init_server_logging;
use crate::web::{create_app, AppState};

/// Options accepted by `oeem-datastore serve`
#[derive(Debug, Clone, PartialEq)]
pub struct ServerOptions {
    pub bind: String,
    pub workers: usize,
    pub timeout_seconds: u64,
    pub log_level: String,
    pub log_file: PathBuf,
    pub access_log: PathBuf,
    /// Trailing arguments forwarded by the entrypoint
    pub extra_args: Vec<String>,
}

impl ServerOptions {
    /// Defaults taken from the `web` and `entrypoint` configuration sections
    pub fn from_config(config: &DatastoreConfig) -> Self {
        Self {
            bind: config.web.bind_address.clone(),
            workers: config.web.workers,
            timeout_seconds: config.web.timeout_seconds,
            log_level: config.entrypoint.log_level.clone(),
            log_file: config.entrypoint.server_log_file.clone(),
            access_log: config.entrypoint.access_log_file.clone(),
            extra_args: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind.trim().is_empty() {
            return Err(DatastoreError::validation("bind address must not be empty"));
        }
        if self.workers == 0 {
            return Err(DatastoreError::validation("workers must be at least 1"));
        }
        if self.timeout_seconds == 0 {
            return Err(DatastoreError::validation("timeout must be at least 1 second"));
        }
        Ok(())
    }

    /// `serve` command line for these options, extra arguments last
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "serve".to_string(),
            "--bind".to_string(),
            self.bind.clone(),
            "--workers".to_string(),
            self.workers.to_string(),
            "--timeout".to_string(),
            self.timeout_seconds.to_string(),
            "--log-level".to_string(),
            self.log_level.clone(),
            "--log-file".to_string(),
            self.log_file.display().to_string(),
            "--access-logfile".to_string(),
            self.access_log.display().to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Build the runtime and serve until shutdown
pub fn run(options: ServerOptions, config: DatastoreConfig) -> Result<()> {
    options.validate()?;
    init_server_logging(&options.log_level, &options.log_file, &options.access_log)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(options.workers)
        .thread_name("oeem-datastore-worker")
        .enable_all()
        .build()
        .map_err(|e| DatastoreError::io("tokio runtime", e))?;

    runtime.block_on(serve(options, config))
}

/// Serve the web API on an already running runtime
pub async fn serve(options: ServerOptions, mut config: DatastoreConfig) -> Result<()> {
    config.web.bind_address = options.bind.clone();
    config.web.workers = options.workers;
    config.web.timeout_seconds = options.timeout_seconds;

    info!(
        bind = %options.bind,
        workers = options.workers,
        timeout_seconds = options.timeout_seconds,
        extra_args = ?options.extra_args,
        "Starting datastore server"
    );

    let database = DatabaseConnection::connect(&config.database).await?;
    let app = create_app(AppState::new(database.pool().clone(), config));

    let listener = TcpListener::bind(&options.bind)
        .await
        .map_err(|e| DatastoreError::io(&options.bind, e))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DatastoreError::io(&options.bind, e))?;

    database.close().await;
    info!("Datastore server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_default_config() {
        let options = ServerOptions::from_config(&DatastoreConfig::default());
        assert_eq!(options.bind, "0.0.0.0:8000");
        assert_eq!(options.workers, 3);
        assert_eq!(options.timeout_seconds, 180);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_to_args_appends_extra_arguments() {
        let mut options = ServerOptions::from_config(&DatastoreConfig::default());
        options.extra_args = vec!["--reload".to_string()];

        assert_eq!(
            options.to_args(),
            vec![
                "serve",
                "--bind",
                "0.0.0.0:8000",
                "--workers",
                "3",
                "--timeout",
                "180",
                "--log-level",
                "info",
                "--log-file",
                "/srv/logs/gunicorn.log",
                "--access-logfile",
                "/srv/logs/access.log",
                "--reload",
            ]
        );
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut options = ServerOptions::from_config(&DatastoreConfig::default());
        options.workers = 0;
        assert!(matches!(options.validate(), Err(DatastoreError::Validation(_))));
    }
}
