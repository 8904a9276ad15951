#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # OEEM Energy Datastore
//!
//! Datastore for building energy efficiency projects: metered consumption,
//! savings evaluation ("meter runs") and per-block summaries, served over a
//! token-authenticated JSON API.
//!
//! ## Module Organization
//!
//! - [`models`] - Row types and queries for every datastore table
//! - [`database`] - Connection pooling and embedded migrations
//! - [`meter`] - Temperature-sensitivity models, savings and block summaries
//! - [`web`] - axum router, token authentication and handlers
//! - [`server`] - Multi-threaded application server
//! - [`entrypoint`] - Container startup and handoff to the server
//! - [`ci`] - Fail-fast Travis-style pipeline runner
//! - [`staticfiles`] / [`logtail`] - `collectstatic` and `tail-logs`
//! - [`config`] - YAML configuration with environment overlays
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-wide error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oeem_datastore::config::ConfigManager;
//! use oeem_datastore::database::{run_migrations, DatabaseConnection};
//! use oeem_datastore::models::Project;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let db = DatabaseConnection::connect(&manager.config().database).await?;
//! run_migrations(db.pool()).await?;
//!
//! for project in Project::list_all(db.pool()).await? {
//!     println!("{} {:?}", project.project_id, project.location());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Database tests use `#[sqlx::test]` with an isolated database per test and
//! need `DATABASE_URL`:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod ci;
pub mod config;
pub mod database;
pub mod entrypoint;
pub mod error;
pub mod logging;
pub mod logtail;
pub mod meter;
pub mod models;
pub mod server;
pub mod staticfiles;
pub mod web;

pub use config::{ConfigManager, DatastoreConfig};
pub use error::{DatastoreError, Result};
