//! # Meter Evaluation
//!
//! Estimates energy savings for projects from their consumption records and
//! daily temperatures.
//!
//! ## Flow
//!
//! 1. A project's [`Location`] resolves to a weather station ([`location`]).
//! 2. Each consumption series is split into baseline and reporting periods
//!    ([`consumption`]).
//! 3. A [`TemperatureSensitivityModel`] is fit to each period.
//! 4. [`MeterRunner`] derives annualized usage and savings, then persists a
//!    meter run with daily and monthly usage series.
//! 5. [`summarize_block`] sums the latest runs of a project block by fuel type.

pub mod consumption;
pub mod import;
pub mod location;
pub mod model;
pub mod runner;
pub mod summary;
pub mod weather;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use consumption::UsagePeriod;
pub use import::{import_stations, import_temperatures, import_zipcodes};
pub use location::{haversine_miles, nearest_station};
pub use model::{ModelFit, ModelParameters, TemperatureSensitivityModel};
pub use runner::{MeterKind, MeterRunner};
pub use summary::{summarize_block, SummaryBuilder};
pub use weather::{PgWeatherSource, WeatherSource};

/// Time window with optional bounds; a missing bound is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Period {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Period {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(Some(start), Some(end))
    }

    /// Whether `[start, end)` lies entirely inside this period
    pub fn contains_span(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| start >= s) && self.end.map_or(true, |e| end <= e)
    }

    /// Calendar days from the start date for the whole number of elapsed days
    pub fn days(&self) -> Vec<NaiveDate> {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Vec::new();
        };
        let count = (end - start).num_days().max(0);
        let first = start.date_naive();
        (0..count)
            .filter_map(|offset| first.checked_add_days(chrono::Days::new(offset as u64)))
            .collect()
    }
}

/// Where a project is; resolved to a weather station before evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Location {
    LatLng(f64, f64),
    Station(String),
    Zipcode(String),
}
