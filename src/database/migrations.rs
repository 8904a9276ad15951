//! # Database Migration System
//!
//! Schema migrations embedded from the `migrations/` directory. This is the
//! entrypoint's `migrate` step and the `migrate` CLI command.
//!
//! Migrations follow sqlx's naming convention: `YYYYMMDDHHMMSS_description.sql`.

use sqlx::PgPool;
use tracing::info;

use crate::error::Result;
use crate::logging::{log_database_operation, log_error};

/// Embedded migrator
///
/// ```rust,ignore
/// #[sqlx::test(migrator = "oeem_datastore::database::MIGRATOR")]
/// async fn test_something(pool: PgPool) { /* ... */ }
/// ```
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply all pending migrations in version order
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let pending: Vec<String> = MIGRATOR
        .iter()
        .map(|migration| format!("{}_{}", migration.version, migration.description))
        .collect();

    info!(known_migrations = ?pending, "Running database migrations");
    if let Err(e) = MIGRATOR.run(pool).await {
        log_error("database", "migrate", &e.to_string(), pending.last().map(String::as_str));
        return Err(e.into());
    }
    log_database_operation("migrate", Some("_sqlx_migrations"), None, "complete", None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_embedded() {
        assert!(MIGRATOR.iter().count() >= 1);
        let first = MIGRATOR.iter().next().unwrap();
        assert_eq!(first.version, 20150801000000);
    }

    #[sqlx::test(migrations = false)]
    async fn test_run_migrations_is_idempotent(pool: PgPool) -> sqlx::Result<()> {
        run_migrations(&pool).await.expect("first run");
        run_migrations(&pool).await.expect("second run");

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = 'consumption_records')",
        )
        .fetch_one(&pool)
        .await?;
        assert!(exists);
        Ok(())
    }
}
