use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::DatastoreError;
use crate::meter::{summarize_block, MeterKind, MeterRunner, WeatherSource};
use crate::models::{FuelTypeSummary, MeterRun, Project};

/// Named group of projects whose results are summed by fuel type
/// Maps to `project_blocks` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProjectBlock {
    pub id: i64,
    pub name: String,
    #[serde(rename = "project_owner")]
    pub project_owner_id: i64,
    pub added: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl ProjectBlock {
    pub async fn create(pool: &PgPool, name: &str, project_owner_id: i64) -> Result<ProjectBlock, sqlx::Error> {
        sqlx::query_as::<_, ProjectBlock>(
            r#"
            INSERT INTO project_blocks (name, project_owner_id)
            VALUES ($1, $2)
            RETURNING id, name, project_owner_id, added, updated
            "#,
        )
        .bind(name)
        .bind(project_owner_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<ProjectBlock>, sqlx::Error> {
        sqlx::query_as::<_, ProjectBlock>(
            "SELECT id, name, project_owner_id, added, updated FROM project_blocks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Idempotent: adding a member twice is a no-op
    pub async fn add_project(&self, pool: &PgPool, project_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO project_block_projects (project_block_id, project_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(self.id)
        .bind(project_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn projects(&self, pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.project_owner_id, p.project_id,
                   p.baseline_period_start, p.baseline_period_end,
                   p.reporting_period_start, p.reporting_period_end,
                   p.zipcode, p.weather_station, p.latitude, p.longitude,
                   p.added, p.updated
            FROM projects p
            JOIN project_block_projects bp ON bp.project_id = p.id
            WHERE bp.project_block_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(self.id)
        .fetch_all(pool)
        .await
    }

    pub async fn recent_summaries(&self, pool: &PgPool) -> Result<Vec<FuelTypeSummary>, sqlx::Error> {
        FuelTypeSummary::recent_for_block(pool, self.id).await
    }

    /// Evaluate every member project
    pub async fn run_meters<W: WeatherSource>(
        &self,
        runner: &MeterRunner<W>,
        kind: MeterKind,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<MeterRun>, DatastoreError> {
        runner.run_block(self, kind, start, end).await
    }

    /// Store fresh fuel type summaries from the members' latest meter runs
    pub async fn compute_summary_timeseries(&self, pool: &PgPool) -> Result<Vec<FuelTypeSummary>, DatastoreError> {
        summarize_block(pool, self).await
    }
}
