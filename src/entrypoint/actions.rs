//! Side effects performed by the entrypoint
//!
//! [`StartupActions`] is the seam between the entrypoint's control flow and the
//! machine it runs on. [`SystemActions`] is the real implementation.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use async_trait::async_trait;
use tracing::info;

use crate::config::{ConfigManager, DatastoreConfig};
use crate::database::{run_migrations, DatabaseConnection};
use crate::entrypoint::envfile::load_env_file;
use crate::error::{DatastoreError, Result};
use crate::staticfiles::collect_static;

#[async_trait]
pub trait StartupActions: Send {
    /// Source an env file into the environment seen by later steps
    ///
    /// Returns the configuration resolved against the sourced environment
    /// when the implementation reloads it.
    fn load_env_file(&mut self, path: &Path) -> Result<Option<DatastoreConfig>>;

    fn env_var(&self, name: &str) -> Option<String>;

    async fn migrate(&mut self) -> Result<()>;

    /// Returns the number of files collected
    fn collect_static(&mut self) -> Result<usize>;

    /// Create a single directory; an existing directory is an error
    fn create_dir(&mut self, path: &Path) -> Result<()>;

    /// Create a file if missing, never truncating it
    fn touch_file(&mut self, path: &Path) -> Result<()>;

    /// Start the detached process following `dir/*.log`
    fn spawn_log_tail(&mut self, dir: &Path) -> Result<()>;

    fn notice(&mut self, message: &str);
}

/// Startup actions against the real filesystem, environment and database
pub struct SystemActions {
    config: DatastoreConfig,
    config_dir: Option<PathBuf>,
    program: PathBuf,
}

impl SystemActions {
    pub fn new(config: DatastoreConfig, program: PathBuf) -> Self {
        Self {
            config,
            config_dir: None,
            program,
        }
    }

    /// Actions that spawn helpers with the currently running executable
    pub fn for_current_exe(config: DatastoreConfig) -> Result<Self> {
        let program = std::env::current_exe().map_err(|e| DatastoreError::io("current executable", e))?;
        Ok(Self::new(config, program))
    }

    /// Directory configuration is reloaded from after the env file is sourced
    pub fn with_config_dir(mut self, config_dir: Option<PathBuf>) -> Self {
        self.config_dir = config_dir;
        self
    }

    /// Resolve configuration again, preferring `sourced` over the process environment
    pub fn reload_config(&mut self, sourced: &[(String, String)]) -> Result<&DatastoreConfig> {
        let lookup = |key: &str| {
            sourced
                .iter()
                .rev()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
                .or_else(|| std::env::var(key).ok())
        };
        let environment = ConfigManager::environment_from(lookup);
        let manager = ConfigManager::load_or_default_with(self.config_dir.clone(), &environment, lookup)?;

        info!(
            environment = %environment,
            static_root = %manager.config().static_files.static_root.display(),
            "Configuration reloaded after env file"
        );
        self.config = manager.config().clone();
        Ok(&self.config)
    }
}

#[async_trait]
impl StartupActions for SystemActions {
    fn load_env_file(&mut self, path: &Path) -> Result<Option<DatastoreConfig>> {
        let sourced = load_env_file(path)?;
        info!(env_file = %path.display(), variables = sourced.len(), "Loaded env file");
        self.reload_config(&sourced).cloned().map(Some)
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    async fn migrate(&mut self) -> Result<()> {
        let connection = DatabaseConnection::connect(&self.config.database).await?;
        run_migrations(connection.pool()).await?;
        connection.close().await;
        Ok(())
    }

    fn collect_static(&mut self) -> Result<usize> {
        collect_static(&self.config.static_files)
    }

    fn create_dir(&mut self, path: &Path) -> Result<()> {
        fs::create_dir(path).map_err(|e| DatastoreError::io(path, e))
    }

    fn touch_file(&mut self, path: &Path) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map(|_| ())
            .map_err(|e| DatastoreError::io(path, e))
    }

    fn spawn_log_tail(&mut self, dir: &Path) -> Result<()> {
        let child = Command::new(&self.program)
            .arg("tail-logs")
            .arg(dir)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| DatastoreError::io(&self.program, e))?;
        info!(pid = child.id(), dir = %dir.display(), "Started log tail");
        Ok(())
    }

    fn notice(&mut self, message: &str) {
        println!("{message}");
        info!("{message}");
    }
}
