use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::config::DatabaseConfig;

pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        debug!(
            pool_size = config.pool,
            acquire_timeout = config.acquire_timeout_seconds,
            "Creating database pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.pool)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<bool, sqlx::Error> {
        health_check(&self.pool).await
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

pub async fn health_check(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 AS health").fetch_one(pool).await?;
    let health: i32 = row.get("health");
    Ok(health == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrator = "crate::database::MIGRATOR")]
    async fn test_health_check(pool: PgPool) -> sqlx::Result<()> {
        let db = DatabaseConnection::from_pool(pool);
        assert!(db.health_check().await?);
        Ok(())
    }
}
