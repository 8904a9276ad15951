use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::debug;

use crate::error::{DatastoreError, Result};
use crate::meter::{nearest_station, Location};
use crate::models::{DailyTemperature, WeatherStation, ZipcodeCentroid};

/// Provides station lookup and observed daily temperatures
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Station id used for `location`
    async fn resolve_station(&self, location: &Location) -> Result<String>;

    /// One mean temperature (°F) per requested day; `None` where unobserved
    async fn daily_temperatures(&self, station: &str, days: &[NaiveDate]) -> Result<Vec<Option<f64>>>;
}

/// Weather data imported into the datastore tables
#[derive(Debug, Clone)]
pub struct PgWeatherSource {
    pool: PgPool,
}

impl PgWeatherSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn nearest_to(&self, lat_lng: (f64, f64)) -> Result<String> {
        let stations = WeatherStation::list_all(&self.pool).await?;
        nearest_station(lat_lng, &stations)
            .map(|s| s.station.clone())
            .ok_or_else(|| DatastoreError::Weather("no weather stations available".to_string()))
    }
}

#[async_trait]
impl WeatherSource for PgWeatherSource {
    async fn resolve_station(&self, location: &Location) -> Result<String> {
        match location {
            Location::Station(station) => Ok(station.clone()),
            Location::LatLng(lat, lng) => self.nearest_to((*lat, *lng)).await,
            Location::Zipcode(zipcode) => {
                let centroid = ZipcodeCentroid::find(&self.pool, zipcode)
                    .await?
                    .ok_or_else(|| DatastoreError::Weather(format!("unknown zipcode '{zipcode}'")))?;
                self.nearest_to((centroid.latitude, centroid.longitude)).await
            }
        }
    }

    async fn daily_temperatures(&self, station: &str, days: &[NaiveDate]) -> Result<Vec<Option<f64>>> {
        let (Some(first), Some(last)) = (days.iter().min(), days.iter().max()) else {
            return Ok(Vec::new());
        };

        let observed: HashMap<NaiveDate, f64> =
            DailyTemperature::list_range(&self.pool, station, *first, *last)
                .await?
                .into_iter()
                .map(|t| (t.date, t.temperature_f))
                .collect();

        debug!(
            station = station,
            requested = days.len(),
            observed = observed.len(),
            "Loaded daily temperatures"
        );

        Ok(days.iter().map(|day| observed.get(day).copied()).collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Single-station source backed by a temperature function
    pub(crate) struct StaticWeatherSource {
        pub station: String,
        pub temperature: fn(NaiveDate) -> Option<f64>,
    }

    #[async_trait]
    impl WeatherSource for StaticWeatherSource {
        async fn resolve_station(&self, _location: &Location) -> Result<String> {
            Ok(self.station.clone())
        }

        async fn daily_temperatures(&self, _station: &str, days: &[NaiveDate]) -> Result<Vec<Option<f64>>> {
            Ok(days.iter().map(|d| (self.temperature)(*d)).collect())
        }
    }
}
