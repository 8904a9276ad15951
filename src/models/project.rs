use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::meter::{Location, Period};
use crate::models::{ConsumptionMetadata, MeterRun};

const PROJECT_COLUMNS: &str = r#"
    id, project_owner_id, project_id,
    baseline_period_start, baseline_period_end,
    reporting_period_start, reporting_period_end,
    zipcode, weather_station, latitude, longitude,
    added, updated
"#;

/// Energy efficiency project with its baseline and reporting periods
/// Maps to `projects` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: i64,
    #[serde(rename = "project_owner")]
    pub project_owner_id: i64,
    pub project_id: String,
    pub baseline_period_start: Option<DateTime<Utc>>,
    pub baseline_period_end: Option<DateTime<Utc>>,
    pub reporting_period_start: Option<DateTime<Utc>>,
    pub reporting_period_end: Option<DateTime<Utc>>,
    pub zipcode: Option<String>,
    pub weather_station: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub added: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Writable project fields, as accepted by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    #[serde(rename = "project_owner")]
    pub project_owner_id: i64,
    pub project_id: String,
    #[serde(default)]
    pub baseline_period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub baseline_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reporting_period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reporting_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub zipcode: Option<String>,
    #[serde(default)]
    pub weather_station: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl NewProject {
    pub fn validate(&self) -> Result<(), String> {
        if self.project_id.is_empty() || self.project_id.len() > 255 {
            return Err("project_id must be between 1 and 255 characters".to_string());
        }
        for (field, value) in [
            ("zipcode", &self.zipcode),
            ("weather_station", &self.weather_station),
        ] {
            if value.as_ref().is_some_and(|v| v.len() > 10) {
                return Err(format!("{field} must be at most 10 characters"));
            }
        }
        Ok(())
    }
}

impl Project {
    pub async fn create(pool: &PgPool, new_project: &NewProject) -> Result<Project, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO projects (
                project_owner_id, project_id,
                baseline_period_start, baseline_period_end,
                reporting_period_start, reporting_period_end,
                zipcode, weather_station, latitude, longitude
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PROJECT_COLUMNS}
            "#
        );
        Self::bind_fields(sqlx::query_as::<_, Project>(&sql), new_project)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Project>, sqlx::Error> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id");
        sqlx::query_as::<_, Project>(&sql).fetch_all(pool).await
    }

    /// Replace every writable field; `None` when the project does not exist
    pub async fn update(
        pool: &PgPool,
        id: i64,
        fields: &NewProject,
    ) -> Result<Option<Project>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE projects
            SET
                project_owner_id = $1,
                project_id = $2,
                baseline_period_start = $3,
                baseline_period_end = $4,
                reporting_period_start = $5,
                reporting_period_end = $6,
                zipcode = $7,
                weather_station = $8,
                latitude = $9,
                longitude = $10,
                updated = NOW()
            WHERE id = $11
            RETURNING {PROJECT_COLUMNS}
            "#
        );
        Self::bind_fields(sqlx::query_as::<_, Project>(&sql), fields)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn bind_fields<'q>(
        query: sqlx::query::QueryAs<'q, sqlx::Postgres, Project, sqlx::postgres::PgArguments>,
        fields: &'q NewProject,
    ) -> sqlx::query::QueryAs<'q, sqlx::Postgres, Project, sqlx::postgres::PgArguments> {
        query
            .bind(fields.project_owner_id)
            .bind(&fields.project_id)
            .bind(fields.baseline_period_start)
            .bind(fields.baseline_period_end)
            .bind(fields.reporting_period_start)
            .bind(fields.reporting_period_end)
            .bind(&fields.zipcode)
            .bind(&fields.weather_station)
            .bind(fields.latitude)
            .bind(fields.longitude)
    }

    pub fn baseline_period(&self) -> Period {
        Period::new(self.baseline_period_start, self.baseline_period_end)
    }

    pub fn reporting_period(&self) -> Period {
        Period::new(self.reporting_period_start, self.reporting_period_end)
    }

    /// Coordinates, only when both are present
    pub fn lat_lng(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Weather location preference: coordinates, then station, then zipcode
    pub fn location(&self) -> Option<Location> {
        if let Some((lat, lng)) = self.lat_lng() {
            Some(Location::LatLng(lat, lng))
        } else if let Some(station) = &self.weather_station {
            Some(Location::Station(station.clone()))
        } else {
            self.zipcode.clone().map(Location::Zipcode)
        }
    }

    pub async fn consumption_metadata(&self, pool: &PgPool) -> Result<Vec<ConsumptionMetadata>, sqlx::Error> {
        ConsumptionMetadata::list_for_project(pool, self.id).await
    }

    /// Latest meter run of each consumption series in this project
    pub async fn recent_meter_runs(&self, pool: &PgPool) -> Result<Vec<MeterRun>, sqlx::Error> {
        let mut runs = Vec::new();
        for metadata in self.consumption_metadata(pool).await? {
            if let Some(run) = MeterRun::latest_for_consumption(pool, metadata.id).await? {
                runs.push(run);
            }
        }
        Ok(runs)
    }
}
