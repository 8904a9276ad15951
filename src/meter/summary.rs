use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use sqlx::PgPool;
use tracing::info;

use crate::error::Result;
use crate::models::{
    ConsumptionMetadata, FuelType, FuelTypeSummary, ProjectBlock, SummaryTimeseries, UsageSeries,
    UsageValue,
};

#[derive(Debug, Default)]
struct FuelTotals {
    baseline_by_date: BTreeMap<NaiveDate, Vec<f64>>,
    actual_by_date: BTreeMap<NaiveDate, Vec<f64>>,
    reporting_by_date: BTreeMap<NaiveDate, Vec<f64>>,
    baseline_by_month: BTreeMap<NaiveDate, Vec<f64>>,
    actual_by_month: BTreeMap<NaiveDate, Vec<f64>>,
    reporting_by_month: BTreeMap<NaiveDate, Vec<f64>>,
}

/// Accumulates daily usage of many meter runs into per-fuel totals
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    by_fuel: BTreeMap<FuelType, FuelTotals>,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one run's paired daily series
    ///
    /// Actual usage is the reporting value after `reporting_start` and the
    /// baseline value on or before it.
    pub fn add_run(
        &mut self,
        fuel_type: FuelType,
        reporting_start: Option<NaiveDate>,
        baseline: &[UsageValue],
        reporting: &[UsageValue],
    ) {
        let totals = self.by_fuel.entry(fuel_type).or_default();
        for (b, r) in baseline.iter().zip(reporting) {
            let date = b.date;
            let month = date.with_day(1).unwrap_or(date);
            let actual = match reporting_start {
                Some(start) if date > start => r.value,
                _ => b.value,
            };

            totals.baseline_by_date.entry(date).or_default().push(b.value);
            totals.actual_by_date.entry(date).or_default().push(actual);
            totals.reporting_by_date.entry(date).or_default().push(r.value);
            totals.baseline_by_month.entry(month).or_default().push(b.value);
            totals.actual_by_month.entry(month).or_default().push(actual);
            totals.reporting_by_month.entry(month).or_default().push(r.value);
        }
    }

    /// Sorted per-fuel sums, ignoring NaN values
    pub fn build(self) -> Vec<(FuelType, SummaryTimeseries)> {
        self.by_fuel
            .into_iter()
            .map(|(fuel_type, totals)| {
                let timeseries = SummaryTimeseries {
                    daily_baseline: nan_sums(totals.baseline_by_date),
                    daily_actual: nan_sums(totals.actual_by_date),
                    daily_reporting: nan_sums(totals.reporting_by_date),
                    monthly_baseline: nan_sums(totals.baseline_by_month),
                    monthly_actual: nan_sums(totals.actual_by_month),
                    monthly_reporting: nan_sums(totals.reporting_by_month),
                };
                (fuel_type, timeseries)
            })
            .collect()
    }
}

fn nan_sums(groups: BTreeMap<NaiveDate, Vec<f64>>) -> Vec<UsageValue> {
    groups
        .into_iter()
        .map(|(date, values)| UsageValue::new(date, values.iter().filter(|v| !v.is_nan()).sum()))
        .collect()
}

/// Sum the latest meter run of every consumption series in the block's
/// projects and store a new summary per fuel type
pub async fn summarize_block(pool: &PgPool, block: &ProjectBlock) -> Result<Vec<FuelTypeSummary>> {
    let mut builder = SummaryBuilder::new();

    for project in block.projects(pool).await? {
        let reporting_start = project.reporting_period_start.map(|s| s.date_naive());
        for run in project.recent_meter_runs(pool).await? {
            let Some(metadata) = ConsumptionMetadata::find_by_id(pool, run.consumption_metadata_id).await? else {
                continue;
            };
            let baseline = run.usage(pool, UsageSeries::DailyBaseline).await?;
            let reporting = run.usage(pool, UsageSeries::DailyReporting).await?;
            builder.add_run(metadata.fuel_type, reporting_start, &baseline, &reporting);
        }
    }

    let mut summaries = Vec::new();
    for (fuel_type, timeseries) in builder.build() {
        let summary = FuelTypeSummary::create(pool, block.id, fuel_type, &timeseries).await?;
        summaries.push(summary);
    }

    info!(
        project_block_id = block.id,
        summaries = summaries.len(),
        "Computed project block summary timeseries"
    );
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2014, m, d).unwrap()
    }

    fn series(values: &[(NaiveDate, f64)]) -> Vec<UsageValue> {
        values.iter().map(|(d, v)| UsageValue::new(*d, *v)).collect()
    }

    #[test]
    fn test_actual_switches_after_reporting_start() {
        let mut builder = SummaryBuilder::new();
        builder.add_run(
            FuelType::Electricity,
            Some(day(1, 31)),
            &series(&[(day(1, 31), 10.0), (day(2, 1), 10.0)]),
            &series(&[(day(1, 31), 7.0), (day(2, 1), 7.0)]),
        );

        let built = builder.build();
        assert_eq!(built.len(), 1);
        let (fuel, ts) = &built[0];
        assert_eq!(*fuel, FuelType::Electricity);
        assert_eq!(ts.daily_actual, series(&[(day(1, 31), 10.0), (day(2, 1), 7.0)]));
        assert_eq!(ts.monthly_actual, series(&[(day(1, 1), 10.0), (day(2, 1), 7.0)]));
        assert_eq!(ts.monthly_reporting, series(&[(day(1, 1), 7.0), (day(2, 1), 7.0)]));
    }

    #[test]
    fn test_sums_by_fuel_ignore_nan() {
        let mut builder = SummaryBuilder::new();
        builder.add_run(
            FuelType::NaturalGas,
            None,
            &series(&[(day(3, 2), 1.0), (day(3, 1), f64::NAN)]),
            &series(&[(day(3, 2), 0.5), (day(3, 1), 0.5)]),
        );
        builder.add_run(
            FuelType::NaturalGas,
            None,
            &series(&[(day(3, 1), 2.0)]),
            &series(&[(day(3, 1), 1.5)]),
        );
        builder.add_run(
            FuelType::Electricity,
            None,
            &series(&[(day(3, 1), 4.0)]),
            &series(&[(day(3, 1), 3.0)]),
        );

        let built = builder.build();
        assert_eq!(built.len(), 2);
        let (_, gas) = built
            .iter()
            .find(|(f, _)| *f == FuelType::NaturalGas)
            .unwrap();
        assert_eq!(gas.daily_baseline, series(&[(day(3, 1), 2.0), (day(3, 2), 1.0)]));
        assert_eq!(gas.daily_actual, gas.daily_baseline);
        assert_eq!(gas.daily_reporting, series(&[(day(3, 1), 2.0), (day(3, 2), 0.5)]));
        assert_eq!(gas.monthly_baseline, series(&[(day(3, 1), 3.0)]));
    }

    #[test]
    fn test_empty_builder() {
        assert!(SummaryBuilder::new().build().is_empty());
    }
}
