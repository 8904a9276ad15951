//! # Database Operations
//!
//! Connection pooling and schema migrations for the PostgreSQL datastore.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use oeem_datastore::config::DatabaseConfig;
//! use oeem_datastore::database::{run_migrations, DatabaseConnection};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseConnection::connect(&DatabaseConfig::default()).await?;
//! run_migrations(db.pool()).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod migrations;

pub use connection::DatabaseConnection;
pub use migrations::{run_migrations, MIGRATOR};
