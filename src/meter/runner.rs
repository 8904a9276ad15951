use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::config::MeterConfig;
use crate::error::{DatastoreError, Result};
use crate::logging::log_meter_operation;
use crate::meter::consumption::{periods_within, usage_periods};
use crate::meter::model::Observation;
use crate::meter::{ModelFit, Period, TemperatureSensitivityModel, UsagePeriod, WeatherSource};
use crate::models::{
    ConsumptionMetadata, MeterRun, MeterRunUsage, MeterType, NewMeterRun, Project, ProjectBlock,
    UsageValue,
};

/// Which default meter evaluates the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterKind {
    #[default]
    Residential,
    Commercial,
}

impl MeterKind {
    pub fn is_commercial(&self) -> bool {
        matches!(self, MeterKind::Commercial)
    }
}

impl std::str::FromStr for MeterKind {
    type Err = DatastoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "residential" => Ok(MeterKind::Residential),
            "commercial" => Ok(MeterKind::Commercial),
            other => Err(DatastoreError::validation(format!("unknown meter type '{other}'"))),
        }
    }
}

/// Derived results for one consumption series
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesEvaluation {
    pub baseline: Option<ModelFit>,
    pub reporting: Option<ModelFit>,
    pub annual_usage_baseline: Option<f64>,
    pub annual_usage_reporting: Option<f64>,
    pub gross_savings: Option<f64>,
    pub annual_savings: Option<f64>,
    pub usage: MeterRunUsage,
}

impl SeriesEvaluation {
    fn into_new_run(
        self,
        project_id: i64,
        consumption_metadata_id: i64,
        meter_type: MeterType,
        serialization: String,
    ) -> (NewMeterRun, MeterRunUsage) {
        let run = NewMeterRun {
            project_id,
            consumption_metadata_id,
            serialization: Some(serialization),
            annual_usage_baseline: self.annual_usage_baseline,
            annual_usage_reporting: self.annual_usage_reporting,
            gross_savings: self.gross_savings,
            annual_savings: self.annual_savings,
            meter_type: Some(meter_type),
            model_parameter_json_baseline: self.baseline.as_ref().map(|f| f.parameters.to_json()),
            model_parameter_json_reporting: self.reporting.as_ref().map(|f| f.parameters.to_json()),
            cvrmse_baseline: self.baseline.as_ref().and_then(|f| f.cvrmse),
            cvrmse_reporting: self.reporting.as_ref().and_then(|f| f.cvrmse),
        };
        (run, self.usage)
    }
}

/// Fits baseline and reporting models for projects and persists meter runs
pub struct MeterRunner<W: WeatherSource> {
    pool: PgPool,
    weather: W,
    config: MeterConfig,
}

impl<W: WeatherSource> MeterRunner<W> {
    pub fn new(pool: PgPool, weather: W, config: MeterConfig) -> Self {
        Self { pool, weather, config }
    }

    /// Run every project in a block
    pub async fn run_block(
        &self,
        block: &ProjectBlock,
        kind: MeterKind,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<MeterRun>> {
        let mut runs = Vec::new();
        for project in block.projects(&self.pool).await? {
            runs.extend(self.run_project(&project, kind, start, end).await?);
        }
        Ok(runs)
    }

    /// Evaluate each consumption series of `project`
    ///
    /// A project whose location cannot be resolved is skipped with a warning.
    /// The daily evaluation period defaults to the earliest record through now.
    #[instrument(skip(self, project), fields(project_id = project.id))]
    pub async fn run_project(
        &self,
        project: &Project,
        kind: MeterKind,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<MeterRun>> {
        let Some(location) = project.location() else {
            warn!(project_id = %project.project_id, "Project has no location; skipping");
            return Ok(Vec::new());
        };
        let station = match self.weather.resolve_station(&location).await {
            Ok(station) => station,
            Err(DatastoreError::Weather(reason)) => {
                warn!(project_id = %project.project_id, reason = %reason, "Cannot resolve weather station; skipping");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut series = Vec::new();
        for metadata in project.consumption_metadata(&self.pool).await? {
            let records = metadata.records(&self.pool).await?;
            series.push((metadata, records));
        }

        let now = Utc::now();
        let evaluation_start = start.unwrap_or_else(|| {
            series
                .iter()
                .flat_map(|(_, records)| records.iter().map(|r| r.start))
                .min()
                .map_or(now, |earliest| earliest.min(now))
        });
        let evaluation = Period::closed(evaluation_start, end.unwrap_or(now));

        let mut runs = Vec::with_capacity(series.len());
        for (metadata, records) in series {
            let run = self
                .run_series(project, &metadata, &records, kind, &station, &evaluation)
                .await?;
            runs.push(run);
        }

        info!(project_id = %project.project_id, runs = runs.len(), station = %station, "Meter runs complete");
        Ok(runs)
    }

    async fn run_series(
        &self,
        project: &Project,
        metadata: &ConsumptionMetadata,
        records: &[crate::models::ConsumptionRecord],
        kind: MeterKind,
        station: &str,
        evaluation: &Period,
    ) -> Result<MeterRun> {
        let model = TemperatureSensitivityModel::for_fuel(metadata.fuel_type, &self.config);
        let periods = usage_periods(records);
        let reporting_days = reporting_days(&project.reporting_period(), evaluation);

        let mut needed: BTreeSet<NaiveDate> = periods.iter().flat_map(|p| p.days()).collect();
        needed.extend(evaluation.days());
        needed.extend(reporting_days.iter().copied());
        let days: Vec<NaiveDate> = needed.into_iter().collect();
        let temperatures: HashMap<NaiveDate, f64> = days
            .iter()
            .copied()
            .zip(self.weather.daily_temperatures(station, &days).await?)
            .filter_map(|(day, t)| t.map(|t| (day, t)))
            .collect();

        let evaluation_result = evaluate_series(
            &model,
            &periods,
            &project.baseline_period(),
            &project.reporting_period(),
            evaluation,
            &temperatures,
        );
        if evaluation_result.baseline.is_none() || evaluation_result.reporting.is_none() {
            warn!(
                consumption_metadata_id = metadata.id,
                "Insufficient data to fit baseline and reporting models"
            );
        }

        let meter_type = MeterType::for_fuel(kind.is_commercial(), metadata.fuel_type);
        let serialization = serde_json::json!({
            "meter": kind,
            "fuel_type": metadata.fuel_type.tag(),
            "model": model,
        })
        .to_string();

        let (new_run, usage) =
            evaluation_result.into_new_run(project.id, metadata.id, meter_type, serialization);
        let run = MeterRun::create_with_usage(&self.pool, &new_run, &usage).await?;

        log_meter_operation(
            "run_meter",
            Some(project.id),
            Some(metadata.id),
            "SUCCESS",
            Some(meter_type.code()),
        );
        Ok(run)
    }
}

fn reporting_days(reporting: &Period, evaluation: &Period) -> Vec<NaiveDate> {
    match reporting.start {
        Some(start) => Period::new(Some(start), reporting.end.or(evaluation.end)).days(),
        None => Vec::new(),
    }
}

fn observations(periods: &[UsagePeriod], temperatures: &HashMap<NaiveDate, f64>) -> Vec<Observation> {
    periods
        .iter()
        .filter_map(|p| {
            Some(Observation {
                daily_usage: p.daily_usage()?,
                temperatures: p.days().iter().filter_map(|d| temperatures.get(d).copied()).collect(),
            })
        })
        .collect()
}

fn nan_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        f64::NAN
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Monthly means of daily values; the evaluation start month is always present
fn monthly_averages(start: NaiveDate, daily: &[UsageValue]) -> Vec<UsageValue> {
    let mut months: Vec<(NaiveDate, Vec<f64>)> = vec![(first_of_month(start), Vec::new())];
    for value in daily {
        let month = first_of_month(value.date);
        match months.last_mut() {
            Some((current, values)) if *current == month => values.push(value.value),
            _ => months.push((month, vec![value.value])),
        }
    }
    months
        .into_iter()
        .map(|(month, values)| {
            let average = if values.is_empty() { 0.0 } else { nan_mean(&values) };
            UsageValue::new(month, average)
        })
        .collect()
}

/// Fit, derive savings, and produce usage series for one consumption series
pub fn evaluate_series(
    model: &TemperatureSensitivityModel,
    periods: &[UsagePeriod],
    baseline_period: &Period,
    reporting_period: &Period,
    evaluation: &Period,
    temperatures: &HashMap<NaiveDate, f64>,
) -> SeriesEvaluation {
    let baseline = model.fit(&observations(&periods_within(periods, baseline_period), temperatures));
    let reporting = model.fit(&observations(&periods_within(periods, reporting_period), temperatures));

    let evaluation_days = evaluation.days();
    let evaluation_temps: Vec<Option<f64>> =
        evaluation_days.iter().map(|d| temperatures.get(d).copied()).collect();

    let annualized = |fit: &Option<ModelFit>| {
        fit.as_ref().and_then(|f| {
            let mean = nan_mean(&f.parameters.transform(&evaluation_temps));
            (!mean.is_nan()).then_some(365.0 * mean)
        })
    };
    let annual_usage_baseline = annualized(&baseline);
    let annual_usage_reporting = annualized(&reporting);
    let annual_savings = annual_usage_baseline.zip(annual_usage_reporting).map(|(b, r)| b - r);

    let gross_savings = baseline.as_ref().zip(reporting.as_ref()).and_then(|(b, r)| {
        let temps: Vec<Option<f64>> = reporting_days(reporting_period, evaluation)
            .iter()
            .map(|d| temperatures.get(d).copied())
            .collect();
        let savings: Vec<f64> = b
            .parameters
            .transform(&temps)
            .into_iter()
            .zip(r.parameters.transform(&temps))
            .map(|(b, r)| b - r)
            .filter(|s| !s.is_nan())
            .collect();
        (!temps.is_empty()).then(|| savings.iter().sum::<f64>())
    });

    let mut usage = MeterRunUsage::default();
    if let (Some(b), Some(r), Some(start)) = (&baseline, &reporting, evaluation.start) {
        let series = |fit: &ModelFit| -> Vec<UsageValue> {
            evaluation_days
                .iter()
                .zip(fit.parameters.transform(&evaluation_temps))
                .map(|(d, v)| UsageValue::new(*d, v))
                .collect()
        };
        usage.daily_baseline = series(b);
        usage.daily_reporting = series(r);
        let start = start.date_naive();
        usage.monthly_average_baseline = monthly_averages(start, &usage.daily_baseline);
        usage.monthly_average_reporting = monthly_averages(start, &usage.daily_reporting);
    }

    SeriesEvaluation {
        baseline,
        reporting,
        annual_usage_baseline,
        annual_usage_reporting,
        gross_savings,
        annual_savings,
        usage,
    }
}
