//! # Structured Logging Module
//!
//! Environment-aware structured logging for the CLI commands, plus the file
//! layout used by the application server (`--log-file` and `--access-logfile`).

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::OnceLock;

use chrono::Utc;
use tracing::Subscriber;
use tracing_subscriber::{
    filter::filter_fn, fmt, fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
    Layer,
};

use crate::error::{DatastoreError, Result};

/// Target for per-request access log events
pub const ACCESS_TARGET: &str = "access";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from("log");
        if let Err(e) = fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create log directory {}: {e}", log_dir.display());
        }

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");
        let log_path = log_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level)),
            );

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_path.display(),
            "Structured logging initialized"
        );

        // the writer must outlive every later log call
        std::mem::forget(guard);
    });
}

/// Initialize logging for the application server
///
/// Server events go only to `log_file` and access events only to
/// `access_log`. The container's log tail surfaces both on stdout.
pub fn init_server_logging(level: &str, log_file: &Path, access_log: &Path) -> Result<()> {
    let (server_writer, server_guard) = tracing_appender::non_blocking(open_appender(log_file)?);
    let (access_writer, access_guard) = tracing_appender::non_blocking(open_appender(access_log)?);

    if server_subscriber(level.to_string(), server_writer, access_writer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized");
    }

    tracing::info!(
        pid = process::id(),
        log_file = %log_file.display(),
        access_log = %access_log.display(),
        level = level,
        "Server logging initialized"
    );

    std::mem::forget(server_guard);
    std::mem::forget(access_guard);
    Ok(())
}

fn server_subscriber<S, A>(level: String, server: S, access: A) -> impl Subscriber + Send + Sync + 'static
where
    S: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    A: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(server)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .with_filter(filter_fn(|meta| meta.target() != ACCESS_TARGET))
                .with_filter(EnvFilter::new(level)),
        )
        .with(
            fmt::layer()
                .with_writer(access)
                .with_target(false)
                .with_level(false)
                .with_ansi(false)
                .with_filter(filter_fn(|meta| meta.target() == ACCESS_TARGET)),
        )
}

fn open_appender(path: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let file_name = path
        .file_name()
        .ok_or_else(|| DatastoreError::validation(format!("{} is not a file path", path.display())))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory).map_err(|e| DatastoreError::io(&directory, e))?;
    Ok(tracing_appender::rolling::never(directory, file_name))
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("DATASTORE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for database operations
pub fn log_database_operation(
    operation: &str,
    table: Option<&str>,
    record_id: Option<i64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        table = table,
        record_id = record_id,
        status = %status,
        details = details,
        "DATABASE_OPERATION"
    );
}

/// Log an error with the component and operation it interrupted
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        "ERROR"
    );
}

/// Log structured data for meter evaluation
pub fn log_meter_operation(
    operation: &str,
    project_id: Option<i64>,
    consumption_metadata_id: Option<i64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        project_id = project_id,
        consumption_metadata_id = consumption_metadata_id,
        status = %status,
        details = details,
        "METER_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_server_and_access_events_each_reach_one_file() {
        let server = Captured::default();
        let access = Captured::default();
        let subscriber = {
            let (server, access) = (server.clone(), access.clone());
            server_subscriber("info".to_string(), move || server.clone(), move || access.clone())
        };

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("worker booted");
            tracing::info!(target: ACCESS_TARGET, "GET /datastore/project/ 200");
        });

        assert!(server.text().contains("worker booted"));
        assert!(!server.text().contains("GET /datastore/project/"));
        assert!(access.text().contains("GET /datastore/project/ 200"));
        assert!(!access.text().contains("worker booted"));
    }

    #[test]
    fn test_operation_helpers_emit_fixed_fields() {
        let server = Captured::default();
        let subscriber = {
            let server = server.clone();
            server_subscriber("info".to_string(), move || server.clone(), std::io::sink)
        };

        tracing::subscriber::with_default(subscriber, || {
            log_database_operation("migrate", Some("_sqlx_migrations"), None, "complete", None);
            log_error("web", "request", "pool timed out", None);
        });

        let text = server.text();
        assert!(text.contains("DATABASE_OPERATION"));
        assert!(text.contains("operation=migrate"));
        assert!(text.contains("component=web"));
        assert!(text.contains("error=pool timed out"));
    }

    #[test]
    fn test_open_appender_creates_parent_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_file = temp_dir.path().join("nested").join("gunicorn.log");

        open_appender(&log_file).unwrap();
        assert!(temp_dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_open_appender_rejects_directory_path() {
        assert!(open_appender(Path::new("/")).is_err());
    }
}
