//! # Container Entrypoint
//!
//! `oeem-datastore start` prepares the container and then replaces itself with
//! the application server:
//!
//! 1. source the env file and resolve configuration against it
//! 2. when `SETUP` is set and non-empty, migrate then collect static files
//! 3. create the worker directories
//! 4. create the log files and start a detached log tail
//! 5. `exec` the server with the configured bind, workers and timeout, plus
//!    every argument given to the entrypoint
//!
//! Every step is fatal on error. The background worker itself is never
//! started; its directories and log file are still created.

pub mod actions;
pub mod envfile;

use std::path::PathBuf;
use std::process::Command;

use tracing::info;

use crate::config::DatastoreConfig;
use crate::error::{DatastoreError, Result};
use crate::server::ServerOptions;

pub use actions::{StartupActions, SystemActions};

pub const SKIP_SETUP_NOTICE: &str = "SETUP not set, skipping migrations and collectstatic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrypointState {
    Unconfigured,
    /// Terminal: the handoff has been produced
    Running,
}

/// Program and arguments that replace the entrypoint process
#[derive(Debug, Clone, PartialEq)]
pub struct Handoff {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Handoff {
    /// Replace the current process image; only returns on failure
    #[cfg(unix)]
    pub fn exec(self) -> DatastoreError {
        use std::os::unix::process::CommandExt;

        info!(program = %self.program.display(), args = ?self.args, "Handing off to application server");
        let err = Command::new(&self.program).args(&self.args).exec();
        DatastoreError::Entrypoint(format!("exec {} failed: {err}", self.program.display()))
    }

    #[cfg(not(unix))]
    pub fn exec(self) -> DatastoreError {
        info!(program = %self.program.display(), args = ?self.args, "Handing off to application server");
        match Command::new(&self.program).args(&self.args).status() {
            Ok(status) => std::process::exit(status.code().unwrap_or(1)),
            Err(err) => DatastoreError::io(&self.program, err),
        }
    }
}

pub struct Entrypoint {
    config: DatastoreConfig,
    program: PathBuf,
    state: EntrypointState,
}

impl Entrypoint {
    pub fn new(config: DatastoreConfig, program: PathBuf) -> Self {
        Self {
            config,
            program,
            state: EntrypointState::Unconfigured,
        }
    }

    pub fn state(&self) -> EntrypointState {
        self.state
    }

    /// Run the startup steps and return the server handoff
    pub async fn run<A: StartupActions>(&mut self, actions: &mut A, extra_args: Vec<String>) -> Result<Handoff> {
        if self.state == EntrypointState::Running {
            return Err(DatastoreError::Entrypoint("entrypoint already ran".to_string()));
        }
        let env_file = self.config.entrypoint.env_file.clone();
        if let Some(config) = actions.load_env_file(&env_file)? {
            self.config = config;
        }
        let entrypoint = &self.config.entrypoint;

        let setup = actions
            .env_var(&entrypoint.setup_var)
            .is_some_and(|value| !value.is_empty());
        if setup {
            info!("Running migrations and static collection");
            actions.migrate().await?;
            let collected = actions.collect_static()?;
            info!(collected = collected, "Setup complete");
        } else {
            actions.notice(SKIP_SETUP_NOTICE);
        }

        for dir in &entrypoint.worker_dirs {
            actions.create_dir(dir)?;
        }

        for file in &entrypoint.log_files {
            actions.touch_file(file)?;
        }
        actions.spawn_log_tail(&entrypoint.log_dir)?;

        let mut options = ServerOptions::from_config(&self.config);
        options.extra_args = extra_args;

        self.state = EntrypointState::Running;
        Ok(Handoff {
            program: self.program.clone(),
            args: options.to_args(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;

    #[derive(Default)]
    struct RecordingActions {
        env: HashMap<String, String>,
        env_file: HashMap<String, String>,
        reloaded: Option<DatastoreConfig>,
        calls: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl RecordingActions {
        fn record(&mut self, call: String) -> Result<()> {
            let failed = self.fail_on.is_some_and(|prefix| call.starts_with(prefix));
            self.calls.push(call.clone());
            if failed {
                return Err(DatastoreError::Entrypoint(format!("{call} failed")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StartupActions for RecordingActions {
        fn load_env_file(&mut self, path: &Path) -> Result<Option<DatastoreConfig>> {
            self.record(format!("load_env_file {}", path.display()))?;
            let loaded = std::mem::take(&mut self.env_file);
            self.env.extend(loaded);
            Ok(self.reloaded.take())
        }

        fn env_var(&self, name: &str) -> Option<String> {
            self.env.get(name).cloned()
        }

        async fn migrate(&mut self) -> Result<()> {
            self.record("migrate".to_string())
        }

        fn collect_static(&mut self) -> Result<usize> {
            self.record("collect_static".to_string()).map(|_| 0)
        }

        fn create_dir(&mut self, path: &Path) -> Result<()> {
            self.record(format!("create_dir {}", path.display()))
        }

        fn touch_file(&mut self, path: &Path) -> Result<()> {
            self.record(format!("touch_file {}", path.display()))
        }

        fn spawn_log_tail(&mut self, dir: &Path) -> Result<()> {
            self.record(format!("spawn_log_tail {}", dir.display()))
        }

        fn notice(&mut self, message: &str) {
            self.calls.push(format!("notice {message}"));
        }
    }

    fn entrypoint() -> Entrypoint {
        Entrypoint::new(DatastoreConfig::default(), PathBuf::from("/usr/local/bin/oeem-datastore"))
    }

    const FILE_STEPS: [&str; 6] = [
        "create_dir /var/run/celery",
        "create_dir /var/log/celery",
        "touch_file /srv/logs/gunicorn.log",
        "touch_file /srv/logs/access.log",
        "touch_file /srv/logs/celery.log",
        "spawn_log_tail /srv/logs",
    ];

    #[tokio::test]
    async fn test_setup_unset_skips_migrations() {
        let mut actions = RecordingActions::default();
        let handoff = entrypoint().run(&mut actions, vec![]).await.unwrap();

        let mut expected = vec![
            "load_env_file env.sh".to_string(),
            format!("notice {SKIP_SETUP_NOTICE}"),
        ];
        expected.extend(FILE_STEPS.iter().map(|s| s.to_string()));
        assert_eq!(actions.calls, expected);
        assert_eq!(handoff.args[0..7], ["serve", "--bind", "0.0.0.0:8000", "--workers", "3", "--timeout", "180"]);
    }

    #[tokio::test]
    async fn test_setup_from_env_file_runs_migrate_then_collectstatic() {
        let mut actions = RecordingActions::default();
        actions.env_file.insert("SETUP".to_string(), "1".to_string());

        entrypoint().run(&mut actions, vec![]).await.unwrap();

        assert_eq!(actions.calls[1], "migrate");
        assert_eq!(actions.calls[2], "collect_static");
        assert_eq!(actions.calls[3], "create_dir /var/run/celery");
        assert!(!actions.calls.iter().any(|c| c.starts_with("notice")));
    }

    #[tokio::test]
    async fn test_empty_setup_counts_as_unset() {
        let mut actions = RecordingActions::default();
        actions.env.insert("SETUP".to_string(), String::new());

        entrypoint().run(&mut actions, vec![]).await.unwrap();
        assert!(!actions.calls.contains(&"migrate".to_string()));
    }

    #[tokio::test]
    async fn test_handoff_forwards_arguments() {
        let mut actions = RecordingActions::default();
        let mut entrypoint = entrypoint();
        let handoff = entrypoint
            .run(&mut actions, vec!["--reload".to_string(), "extra".to_string()])
            .await
            .unwrap();

        assert_eq!(handoff.program, PathBuf::from("/usr/local/bin/oeem-datastore"));
        assert_eq!(
            handoff.args,
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
                "extra",
            ]
        );
        assert_eq!(entrypoint.state(), EntrypointState::Running);
        assert!(entrypoint.run(&mut actions, vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_later_steps_use_configuration_resolved_after_env_file() {
        let mut reloaded = DatastoreConfig::default();
        reloaded.entrypoint.log_dir = PathBuf::from("/var/log/datastore");
        reloaded.entrypoint.log_files = vec![PathBuf::from("/var/log/datastore/gunicorn.log")];
        reloaded.entrypoint.server_log_file = PathBuf::from("/var/log/datastore/gunicorn.log");

        let mut actions = RecordingActions {
            reloaded: Some(reloaded),
            ..Default::default()
        };
        let handoff = entrypoint().run(&mut actions, vec![]).await.unwrap();

        assert!(actions.calls.contains(&"touch_file /var/log/datastore/gunicorn.log".to_string()));
        assert!(actions.calls.contains(&"spawn_log_tail /var/log/datastore".to_string()));
        assert!(!actions.calls.contains(&"touch_file /srv/logs/gunicorn.log".to_string()));
        assert!(handoff.args.contains(&"/var/log/datastore/gunicorn.log".to_string()));
    }

    #[tokio::test]
    async fn test_first_failure_stops_startup() {
        let mut actions = RecordingActions {
            fail_on: Some("migrate"),
            ..Default::default()
        };
        actions.env.insert("SETUP".to_string(), "yes".to_string());

        let mut entrypoint = entrypoint();
        assert!(entrypoint.run(&mut actions, vec![]).await.is_err());
        assert_eq!(actions.calls, vec!["load_env_file env.sh", "migrate"]);
        assert_eq!(entrypoint.state(), EntrypointState::Unconfigured);
    }

    #[tokio::test]
    async fn test_existing_worker_directory_is_fatal() {
        let mut actions = RecordingActions {
            fail_on: Some("create_dir /var/log/celery"),
            ..Default::default()
        };

        assert!(entrypoint().run(&mut actions, vec![]).await.is_err());
        assert!(!actions.calls.iter().any(|c| c.starts_with("touch_file")));
    }
}
