use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::models::{FuelType, UsageValue};

const SUMMARY_COLUMNS: &str = "id, project_block_id, fuel_type, added, updated";

/// Per-fuel aggregate of a project block's meter results
/// Maps to `fuel_type_summaries` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FuelTypeSummary {
    pub id: i64,
    pub project_block_id: i64,
    #[sqlx(try_from = "String")]
    pub fuel_type: FuelType,
    pub added: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummarySeries {
    DailyBaseline,
    DailyActual,
    DailyReporting,
    MonthlyBaseline,
    MonthlyActual,
    MonthlyReporting,
}

impl SummarySeries {
    pub fn table(&self) -> &'static str {
        match self {
            SummarySeries::DailyBaseline => "daily_usage_summary_baseline",
            SummarySeries::DailyActual => "daily_usage_summary_actual",
            SummarySeries::DailyReporting => "daily_usage_summary_reporting",
            SummarySeries::MonthlyBaseline => "monthly_usage_summary_baseline",
            SummarySeries::MonthlyActual => "monthly_usage_summary_actual",
            SummarySeries::MonthlyReporting => "monthly_usage_summary_reporting",
        }
    }
}

/// Summed series for one fuel type, each sorted by date
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryTimeseries {
    pub daily_baseline: Vec<UsageValue>,
    pub daily_actual: Vec<UsageValue>,
    pub daily_reporting: Vec<UsageValue>,
    pub monthly_baseline: Vec<UsageValue>,
    pub monthly_actual: Vec<UsageValue>,
    pub monthly_reporting: Vec<UsageValue>,
}

impl SummaryTimeseries {
    fn series(&self) -> [(SummarySeries, &[UsageValue]); 6] {
        [
            (SummarySeries::DailyBaseline, &self.daily_baseline),
            (SummarySeries::DailyActual, &self.daily_actual),
            (SummarySeries::DailyReporting, &self.daily_reporting),
            (SummarySeries::MonthlyBaseline, &self.monthly_baseline),
            (SummarySeries::MonthlyActual, &self.monthly_actual),
            (SummarySeries::MonthlyReporting, &self.monthly_reporting),
        ]
    }
}

impl FuelTypeSummary {
    /// Store a new summary with all six series in one transaction
    pub async fn create(
        pool: &PgPool,
        project_block_id: i64,
        fuel_type: FuelType,
        timeseries: &SummaryTimeseries,
    ) -> Result<FuelTypeSummary, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO fuel_type_summaries (project_block_id, fuel_type)
            VALUES ($1, $2)
            RETURNING {SUMMARY_COLUMNS}
            "#
        );
        let summary = sqlx::query_as::<_, FuelTypeSummary>(&sql)
            .bind(project_block_id)
            .bind(fuel_type.code())
            .fetch_one(&mut *tx)
            .await?;

        for (series, values) in timeseries.series() {
            insert_series(&mut tx, summary.id, series, values).await?;
        }

        tx.commit().await?;
        Ok(summary)
    }

    /// Newest summary of each fuel type for a block
    pub async fn recent_for_block(
        pool: &PgPool,
        project_block_id: i64,
    ) -> Result<Vec<FuelTypeSummary>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT DISTINCT ON (fuel_type) {SUMMARY_COLUMNS}
            FROM fuel_type_summaries
            WHERE project_block_id = $1
            ORDER BY fuel_type, added DESC, id DESC
            "#
        );
        sqlx::query_as::<_, FuelTypeSummary>(&sql)
            .bind(project_block_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_for_block(
        pool: &PgPool,
        project_block_id: i64,
    ) -> Result<Vec<FuelTypeSummary>, sqlx::Error> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM fuel_type_summaries WHERE project_block_id = $1 ORDER BY added, id"
        );
        sqlx::query_as::<_, FuelTypeSummary>(&sql)
            .bind(project_block_id)
            .fetch_all(pool)
            .await
    }

    pub async fn series(&self, pool: &PgPool, series: SummarySeries) -> Result<Vec<UsageValue>, sqlx::Error> {
        let sql = format!(
            "SELECT date, value FROM {} WHERE fuel_type_summary_id = $1 ORDER BY date, id",
            series.table()
        );
        sqlx::query_as::<_, UsageValue>(&sql)
            .bind(self.id)
            .fetch_all(pool)
            .await
    }
}

async fn insert_series(
    tx: &mut Transaction<'_, Postgres>,
    summary_id: i64,
    series: SummarySeries,
    values: &[UsageValue],
) -> Result<(), sqlx::Error> {
    if values.is_empty() {
        return Ok(());
    }

    let dates: Vec<NaiveDate> = values.iter().map(|v| v.date).collect();
    let amounts: Vec<f64> = values.iter().map(|v| v.value).collect();

    let sql = format!(
        r#"
        INSERT INTO {} (fuel_type_summary_id, date, value)
        SELECT $1, d, v FROM UNNEST($2::date[], $3::float8[]) AS t(d, v)
        "#,
        series.table()
    );
    sqlx::query(&sql)
        .bind(summary_id)
        .bind(&dates)
        .bind(&amounts)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
