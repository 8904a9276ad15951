//! # CI Pipeline Runner
//!
//! Executes a Travis-style pipeline definition: for each runtime version, the
//! `before_install`, `install`, `before_script` and `script` groups run in
//! order in one `sh` session with `TRAVIS_PYTHON_VERSION` set, so exports from
//! earlier steps reach later ones. The first non-zero exit ends the pipeline.
//! There are no retries and no parallel steps.
//!
//! ```rust,no_run
//! use oeem_datastore::ci::{PipelineDefinition, PipelineRunner, ShellExecutor};
//!
//! # async fn example() -> oeem_datastore::error::Result<()> {
//! let definition = PipelineDefinition::from_file("ci/travis.yml".as_ref())?;
//! let report = PipelineRunner::new(definition, ShellExecutor).run_version("3.5").await?;
//! std::process::exit(report.exit_code());
//! # }
//! ```

pub mod definition;
pub mod runner;

pub use definition::{Addons, PipelineDefinition, Stage};
pub use runner::{
    PipelineReport, PipelineRunner, ShellExecutor, ShellSession, StepExecutor, StepResult, StepSession, VERSION_VAR,
};
