use chrono::{DateTime, NaiveDate, Utc};

use crate::meter::Period;
use crate::models::ConsumptionRecord;

/// Usage between one record's start and the next record's start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsagePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub usage: f64,
}

impl UsagePeriod {
    pub fn days(&self) -> Vec<NaiveDate> {
        Period::closed(self.start, self.end).days()
    }

    /// Mean usage per day over the period length
    pub fn daily_usage(&self) -> Option<f64> {
        let seconds = (self.end - self.start).num_seconds();
        if seconds <= 0 {
            return None;
        }
        Some(self.usage / (seconds as f64 / 86_400.0))
    }
}

/// Convert records to consecutive periods; the final record only closes the series
pub fn usage_periods(records: &[ConsumptionRecord]) -> Vec<UsagePeriod> {
    let mut sorted: Vec<&ConsumptionRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.start);

    sorted
        .windows(2)
        .filter_map(|pair| {
            let usage = pair[0].value?;
            (pair[1].start > pair[0].start).then_some(UsagePeriod {
                start: pair[0].start,
                end: pair[1].start,
                usage,
            })
        })
        .collect()
}

/// Periods that fall entirely inside `period`
pub fn periods_within(periods: &[UsagePeriod], period: &Period) -> Vec<UsagePeriod> {
    periods
        .iter()
        .filter(|p| period.contains_span(p.start, p.end))
        .copied()
        .collect()
}
