use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::models::MeterType;

const METER_RUN_COLUMNS: &str = r#"
    id, project_id, consumption_metadata_id, serialization,
    annual_usage_baseline, annual_usage_reporting, gross_savings, annual_savings,
    meter_type, model_parameter_json_baseline, model_parameter_json_reporting,
    cvrmse_baseline, cvrmse_reporting, added, updated
"#;

/// Result of evaluating one consumption series of a project
/// Maps to `meter_runs` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MeterRun {
    pub id: i64,
    pub project_id: i64,
    pub consumption_metadata_id: i64,
    pub serialization: Option<String>,
    pub annual_usage_baseline: Option<f64>,
    pub annual_usage_reporting: Option<f64>,
    pub gross_savings: Option<f64>,
    pub annual_savings: Option<f64>,
    pub meter_type: Option<String>,
    pub model_parameter_json_baseline: Option<String>,
    pub model_parameter_json_reporting: Option<String>,
    pub cvrmse_baseline: Option<f64>,
    pub cvrmse_reporting: Option<f64>,
    pub added: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewMeterRun {
    pub project_id: i64,
    pub consumption_metadata_id: i64,
    pub serialization: Option<String>,
    pub annual_usage_baseline: Option<f64>,
    pub annual_usage_reporting: Option<f64>,
    pub gross_savings: Option<f64>,
    pub annual_savings: Option<f64>,
    pub meter_type: Option<MeterType>,
    pub model_parameter_json_baseline: Option<String>,
    pub model_parameter_json_reporting: Option<String>,
    pub cvrmse_baseline: Option<f64>,
    pub cvrmse_reporting: Option<f64>,
}

/// Per-day or per-month usage value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UsageValue {
    pub date: NaiveDate,
    pub value: f64,
}

impl UsageValue {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Usage time series stored per meter run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageSeries {
    DailyBaseline,
    DailyReporting,
    MonthlyAverageBaseline,
    MonthlyAverageReporting,
}

impl UsageSeries {
    pub const ALL: [UsageSeries; 4] = [
        UsageSeries::DailyBaseline,
        UsageSeries::DailyReporting,
        UsageSeries::MonthlyAverageBaseline,
        UsageSeries::MonthlyAverageReporting,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            UsageSeries::DailyBaseline => "daily_usage_baseline",
            UsageSeries::DailyReporting => "daily_usage_reporting",
            UsageSeries::MonthlyAverageBaseline => "monthly_average_usage_baseline",
            UsageSeries::MonthlyAverageReporting => "monthly_average_usage_reporting",
        }
    }
}

/// Usage series computed for one meter run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeterRunUsage {
    pub daily_baseline: Vec<UsageValue>,
    pub daily_reporting: Vec<UsageValue>,
    pub monthly_average_baseline: Vec<UsageValue>,
    pub monthly_average_reporting: Vec<UsageValue>,
}

impl MeterRunUsage {
    fn series(&self) -> [(UsageSeries, &[UsageValue]); 4] {
        [
            (UsageSeries::DailyBaseline, &self.daily_baseline),
            (UsageSeries::DailyReporting, &self.daily_reporting),
            (UsageSeries::MonthlyAverageBaseline, &self.monthly_average_baseline),
            (UsageSeries::MonthlyAverageReporting, &self.monthly_average_reporting),
        ]
    }
}

impl MeterRun {
    /// Insert a meter run and all its usage series atomically
    pub async fn create_with_usage(
        pool: &PgPool,
        run: &NewMeterRun,
        usage: &MeterRunUsage,
    ) -> Result<MeterRun, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO meter_runs (
                project_id, consumption_metadata_id, serialization,
                annual_usage_baseline, annual_usage_reporting, gross_savings, annual_savings,
                meter_type, model_parameter_json_baseline, model_parameter_json_reporting,
                cvrmse_baseline, cvrmse_reporting
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {METER_RUN_COLUMNS}
            "#
        );
        let meter_run = sqlx::query_as::<_, MeterRun>(&sql)
            .bind(run.project_id)
            .bind(run.consumption_metadata_id)
            .bind(&run.serialization)
            .bind(run.annual_usage_baseline)
            .bind(run.annual_usage_reporting)
            .bind(run.gross_savings)
            .bind(run.annual_savings)
            .bind(run.meter_type.map(|t| t.code()))
            .bind(&run.model_parameter_json_baseline)
            .bind(&run.model_parameter_json_reporting)
            .bind(run.cvrmse_baseline)
            .bind(run.cvrmse_reporting)
            .fetch_one(&mut *tx)
            .await?;

        for (series, values) in usage.series() {
            insert_usage(&mut tx, meter_run.id, series, values).await?;
        }

        tx.commit().await?;
        Ok(meter_run)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<MeterRun>, sqlx::Error> {
        let sql = format!("SELECT {METER_RUN_COLUMNS} FROM meter_runs WHERE id = $1");
        sqlx::query_as::<_, MeterRun>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_project(pool: &PgPool, project_id: i64) -> Result<Vec<MeterRun>, sqlx::Error> {
        let sql = format!(
            "SELECT {METER_RUN_COLUMNS} FROM meter_runs WHERE project_id = $1 ORDER BY added, id"
        );
        sqlx::query_as::<_, MeterRun>(&sql)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Most recently added run for a consumption series
    pub async fn latest_for_consumption(
        pool: &PgPool,
        consumption_metadata_id: i64,
    ) -> Result<Option<MeterRun>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {METER_RUN_COLUMNS}
            FROM meter_runs
            WHERE consumption_metadata_id = $1
            ORDER BY added DESC, id DESC
            LIMIT 1
            "#
        );
        sqlx::query_as::<_, MeterRun>(&sql)
            .bind(consumption_metadata_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn usage(&self, pool: &PgPool, series: UsageSeries) -> Result<Vec<UsageValue>, sqlx::Error> {
        let sql = format!(
            "SELECT date, value FROM {} WHERE meter_run_id = $1 ORDER BY date, id",
            series.table()
        );
        sqlx::query_as::<_, UsageValue>(&sql)
            .bind(self.id)
            .fetch_all(pool)
            .await
    }

    pub fn parsed_meter_type(&self) -> Option<MeterType> {
        self.meter_type.as_deref().and_then(|code| code.parse().ok())
    }

    /// Both fits must exist and have a CVRMSE below `threshold`
    pub fn valid_meter_run(&self, threshold: f64) -> bool {
        match (self.cvrmse_baseline, self.cvrmse_reporting) {
            (Some(baseline), Some(reporting)) => baseline < threshold && reporting < threshold,
            _ => false,
        }
    }
}

async fn insert_usage(
    tx: &mut Transaction<'_, Postgres>,
    meter_run_id: i64,
    series: UsageSeries,
    values: &[UsageValue],
) -> Result<(), sqlx::Error> {
    if values.is_empty() {
        return Ok(());
    }

    let dates: Vec<NaiveDate> = values.iter().map(|v| v.date).collect();
    let amounts: Vec<f64> = values.iter().map(|v| v.value).collect();

    let sql = format!(
        r#"
        INSERT INTO {} (meter_run_id, date, value)
        SELECT $1, d, v FROM UNNEST($2::date[], $3::float8[]) AS t(d, v)
        "#,
        series.table()
    );
    sqlx::query(&sql)
        .bind(meter_run_id)
        .bind(&dates)
        .bind(&amounts)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
