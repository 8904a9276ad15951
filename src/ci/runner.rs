//! Fail-fast pipeline execution
//!
//! All steps of one version share a shell session, so `export`, `cd` and
//! sourced scripts from earlier steps stay in effect for later ones.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::ci::definition::{PipelineDefinition, Stage};
use crate::error::{DatastoreError, Result};

/// Variable naming the runtime version under test
pub const VERSION_VAR: &str = "TRAVIS_PYTHON_VERSION";

/// Opens the session every step of one runtime version runs in
#[async_trait]
pub trait StepExecutor: Send + Sync {
    type Session: StepSession;

    async fn open(&self, version: &str) -> Result<Self::Session>;
}

/// Runs steps in order, keeping shell state between them
#[async_trait]
pub trait StepSession: Send {
    /// Run one step and report its exit code
    async fn execute(&mut self, command: &str) -> Result<i32>;

    async fn close(&mut self) -> Result<()>;
}

/// Runs each version's steps in one `sh` process, inheriting stderr
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

#[async_trait]
impl StepExecutor for ShellExecutor {
    type Session = ShellSession;

    async fn open(&self, version: &str) -> Result<ShellSession> {
        ShellSession::spawn(version)
    }
}

/// A long-lived `sh` reading steps from stdin
///
/// Each step is followed by a marker line carrying its exit status. Step
/// output is copied to our stdout with the marker removed.
pub struct ShellSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    marker: String,
}

impl ShellSession {
    pub fn spawn(version: &str) -> Result<Self> {
        let mut child = Command::new("sh")
            .env(VERSION_VAR, version)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DatastoreError::io("sh", e))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DatastoreError::Pipeline("shell stdout is not captured".to_string()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            marker: format!("__oeem_step_done_{}", Uuid::new_v4().simple()),
        })
    }

    fn script(&self, command: &str) -> String {
        // steps read /dev/null so they cannot consume the following steps
        format!(
            "{{ {command}\n}} </dev/null\nprintf '\\n{marker} %s\\n' \"$?\"\n",
            marker = self.marker
        )
    }
}

#[async_trait]
impl StepSession for ShellSession {
    async fn execute(&mut self, command: &str) -> Result<i32> {
        let script = self.script(command);
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| DatastoreError::Pipeline("shell session is closed".to_string()))?;
        stdin
            .write_all(script.as_bytes())
            .await
            .map_err(|e| DatastoreError::io("sh stdin", e))?;
        stdin.flush().await.map_err(|e| DatastoreError::io("sh stdin", e))?;

        let mut out = tokio::io::stdout();
        // the marker is preceded by a newline; hold back one blank line
        let mut held_blank = false;
        while let Some(line) = self
            .stdout
            .next_line()
            .await
            .map_err(|e| DatastoreError::io("sh stdout", e))?
        {
            if let Some(status) = line.strip_prefix(&self.marker) {
                return status.trim().parse::<i32>().map_err(|_| {
                    DatastoreError::Pipeline(format!("unreadable step status {status:?}"))
                });
            }
            if held_blank {
                out.write_all(b"\n").await.map_err(|e| DatastoreError::io("stdout", e))?;
            }
            held_blank = line.is_empty();
            if !held_blank {
                out.write_all(line.as_bytes()).await.map_err(|e| DatastoreError::io("stdout", e))?;
                out.write_all(b"\n").await.map_err(|e| DatastoreError::io("stdout", e))?;
            }
        }

        // the step ended the shell itself, e.g. with `exit`
        self.stdin = None;
        let status = self.child.wait().await.map_err(|e| DatastoreError::io("sh", e))?;
        debug!(?status, "Shell session ended during step");
        // killed by a signal
        Ok(status.code().unwrap_or(-1))
    }

    async fn close(&mut self) -> Result<()> {
        // end of input ends the shell
        self.stdin = None;
        self.child.wait().await.map_err(|e| DatastoreError::io("sh", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub stage: Stage,
    pub command: String,
    pub exit_code: i32,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl StepResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

/// Outcome of one pipeline run for one runtime version
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub version: String,
    pub steps: Vec<StepResult>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(StepResult::succeeded)
    }

    /// The step that aborted the run, if any
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|step| !step.succeeded())
    }

    /// Exit status for the process running the pipeline
    pub fn exit_code(&self) -> i32 {
        self.failed_step().map_or(0, |step| step.exit_code)
    }
}

pub struct PipelineRunner<E: StepExecutor> {
    definition: PipelineDefinition,
    executor: E,
}

impl<E: StepExecutor> PipelineRunner<E> {
    pub fn new(definition: PipelineDefinition, executor: E) -> Self {
        Self { definition, executor }
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Run every stage for `version`, stopping at the first failing step
    ///
    /// A step that cannot be spawned is an error; a step that exits non-zero
    /// ends the run and is the last entry of the report.
    pub async fn run_version(&self, version: &str) -> Result<PipelineReport> {
        if !self.definition.versions.iter().any(|v| v == version) {
            return Err(DatastoreError::Pipeline(format!("version {version} is not declared")));
        }

        info!(version = version, "Starting pipeline");
        let mut report = PipelineReport {
            version: version.to_string(),
            steps: Vec::new(),
        };
        let mut session = self.executor.open(version).await?;

        for (stage, steps) in self.definition.stages() {
            for command in steps {
                info!(version = version, stage = %stage, command = %command, "Running step");
                let started = Instant::now();
                let exit_code = session.execute(command).await?;
                let result = StepResult {
                    stage,
                    command: command.clone(),
                    exit_code,
                    duration: started.elapsed(),
                };
                let failed = !result.succeeded();
                report.steps.push(result);

                if failed {
                    error!(
                        version = version,
                        stage = %stage,
                        command = %command,
                        exit_code = exit_code,
                        "Pipeline step failed"
                    );
                    session.close().await?;
                    return Ok(report);
                }
            }
        }

        session.close().await?;
        info!(version = version, steps = report.steps.len(), "Pipeline succeeded");
        Ok(report)
    }

    /// Run each declared version in order, stopping after the first failure
    pub async fn run_all(&self) -> Result<Vec<PipelineReport>> {
        let mut reports = Vec::new();
        for version in &self.definition.versions {
            let report = self.run_version(version).await?;
            let failed = !report.succeeded();
            reports.push(report);
            if failed {
                break;
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<(String, String)>>>;

    /// Records commands and fails those containing `fail_on`
    #[derive(Default)]
    struct FakeExecutor {
        fail_on: Option<&'static str>,
        calls: Calls,
    }

    struct FakeSession {
        version: String,
        fail_on: Option<&'static str>,
        calls: Calls,
    }

    #[async_trait]
    impl StepExecutor for FakeExecutor {
        type Session = FakeSession;

        async fn open(&self, version: &str) -> Result<FakeSession> {
            Ok(FakeSession {
                version: version.to_string(),
                fail_on: self.fail_on,
                calls: Arc::clone(&self.calls),
            })
        }
    }

    #[async_trait]
    impl StepSession for FakeSession {
        async fn execute(&mut self, command: &str) -> Result<i32> {
            self.calls
                .lock()
                .unwrap()
                .push((self.version.clone(), command.to_string()));
            Ok(match self.fail_on {
                Some(marker) if command.contains(marker) => 2,
                _ => 0,
            })
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn definition() -> PipelineDefinition {
        PipelineDefinition::from_yaml_str(include_str!("../../ci/travis.yml")).unwrap()
    }

    #[tokio::test]
    async fn test_database_created_before_tests() {
        let runner = PipelineRunner::new(definition(), FakeExecutor::default());
        let report = runner.run_version("3.5").await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.exit_code(), 0);
        let commands: Vec<&str> = report.steps.iter().map(|s| s.command.as_str()).collect();
        let create = commands
            .iter()
            .position(|c| c.contains("create database travis_ci_test"))
            .unwrap();
        let test = commands.iter().position(|c| c.contains("cargo test")).unwrap();
        assert!(create < test);
        assert_eq!(report.steps.last().unwrap().stage, Stage::Script);
    }

    #[tokio::test]
    async fn test_install_failure_prevents_tests() {
        let executor = FakeExecutor {
            fail_on: Some("cargo fetch"),
            ..Default::default()
        };
        let runner = PipelineRunner::new(definition(), executor);
        let report = runner.run_version("2.7").await.unwrap();

        assert!(!report.succeeded());
        assert_eq!(report.exit_code(), 2);
        let failed = report.failed_step().unwrap();
        assert_eq!(failed.stage, Stage::Install);
        assert!(!report.steps.iter().any(|s| s.stage == Stage::Script));
    }

    #[tokio::test]
    async fn test_run_all_stops_at_first_failing_version() {
        let executor = FakeExecutor {
            fail_on: Some("cargo test"),
            ..Default::default()
        };
        let runner = PipelineRunner::new(definition(), executor);
        let reports = runner.run_all().await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].version, "2.7");
        let calls = runner.executor.calls.lock().unwrap();
        assert!(calls.iter().all(|(version, _)| version == "2.7"));
    }

    #[tokio::test]
    async fn test_run_all_versions_in_order() {
        let runner = PipelineRunner::new(definition(), FakeExecutor::default());
        let reports = runner.run_all().await.unwrap();
        let versions: Vec<&str> = reports.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["2.7", "3.4", "3.5"]);
    }

    #[tokio::test]
    async fn test_unknown_version_is_rejected() {
        let runner = PipelineRunner::new(definition(), FakeExecutor::default());
        assert!(runner.run_version("3.9").await.is_err());
    }

    #[tokio::test]
    async fn test_shell_session_reports_exit_codes() {
        let mut session = ShellExecutor.open("3.5").await.unwrap();
        assert_eq!(session.execute("true").await.unwrap(), 0);
        assert_eq!(session.execute("false").await.unwrap(), 1);
        assert_eq!(session.execute("printf 'no newline'").await.unwrap(), 0);
        assert_eq!(
            session
                .execute("test \"$TRAVIS_PYTHON_VERSION\" = 3.5")
                .await
                .unwrap(),
            0
        );
        assert_eq!(session.execute("exit 3").await.unwrap(), 3);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_shell_state_carries_across_stages() {
        let yaml = r#"
language: python
python:
  - "3.5"
before_install:
  - export OEEM_CI_MARK=before-install
  - cd /
install:
  - OEEM_CI_LOCAL=install
script: test "$OEEM_CI_MARK" = before-install && test "$OEEM_CI_LOCAL" = install && test "$(pwd)" = /
"#;
        let definition = PipelineDefinition::from_yaml_str(yaml).unwrap();
        let runner = PipelineRunner::new(definition, ShellExecutor);
        let report = runner.run_version("3.5").await.unwrap();

        assert!(report.succeeded(), "{report:?}");
        assert_eq!(report.steps.len(), 4);
    }
}
