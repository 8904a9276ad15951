//! Weather data import
//!
//! Stations, zipcode centroids and daily temperatures are loaded from JSON
//! arrays into the datastore; the meter never fetches weather remotely.

use std::path::Path;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::error::{DatastoreError, Result};
use crate::models::{DailyTemperature, WeatherStation, ZipcodeCentroid};

/// One row of a temperature file: `{"date": "2014-01-01", "temperature_f": 41.5}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemperatureObservation {
    pub date: NaiveDate,
    pub temperature_f: f64,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let contents = std::fs::read_to_string(path).map_err(|e| DatastoreError::io(path, e))?;
    serde_json::from_str(&contents)
        .map_err(|e| DatastoreError::validation(format!("{}: {e}", path.display())))
}

pub async fn import_stations(pool: &PgPool, path: &Path) -> Result<usize> {
    let stations: Vec<WeatherStation> = read_json(path)?;
    for station in &stations {
        WeatherStation::upsert(pool, station).await?;
    }
    info!(count = stations.len(), file = %path.display(), "Imported weather stations");
    Ok(stations.len())
}

pub async fn import_zipcodes(pool: &PgPool, path: &Path) -> Result<usize> {
    let centroids: Vec<ZipcodeCentroid> = read_json(path)?;
    for centroid in &centroids {
        ZipcodeCentroid::upsert(pool, centroid).await?;
    }
    info!(count = centroids.len(), file = %path.display(), "Imported zipcode centroids");
    Ok(centroids.len())
}

/// Import daily temperatures for a station that must already exist
pub async fn import_temperatures(pool: &PgPool, station: &str, path: &Path) -> Result<u64> {
    if WeatherStation::find(pool, station).await?.is_none() {
        return Err(DatastoreError::Weather(format!("unknown weather station '{station}'")));
    }

    let observations: Vec<TemperatureObservation> = read_json(path)?;
    let rows: Vec<DailyTemperature> = observations
        .into_iter()
        .filter(|o| o.temperature_f.is_finite())
        .map(|o| DailyTemperature {
            station: station.to_string(),
            date: o.date,
            temperature_f: o.temperature_f,
        })
        .collect();

    let written = DailyTemperature::upsert_many(pool, &rows).await?;
    info!(station = station, count = written, file = %path.display(), "Imported daily temperatures");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn json_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[sqlx::test(migrator = "crate::database::MIGRATOR")]
    async fn test_import_weather_files(pool: PgPool) -> sqlx::Result<()> {
        let stations = json_file(r#"[{"station": "722880", "latitude": 34.2, "longitude": -118.35}]"#);
        let zipcodes = json_file(r#"[{"zipcode": "91104", "latitude": 34.16, "longitude": -118.12}]"#);
        let temperatures = json_file(
            r#"[{"date": "2014-01-01", "temperature_f": 55.0}, {"date": "2014-01-02", "temperature_f": 57.5}]"#,
        );

        assert_eq!(import_stations(&pool, stations.path()).await.unwrap(), 1);
        assert_eq!(import_zipcodes(&pool, zipcodes.path()).await.unwrap(), 1);
        assert_eq!(
            import_temperatures(&pool, "722880", temperatures.path()).await.unwrap(),
            2
        );

        let stored = DailyTemperature::list_range(
            &pool,
            "722880",
            NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2014, 1, 31).unwrap(),
        )
        .await?;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].temperature_f, 57.5);

        let unknown = import_temperatures(&pool, "000000", temperatures.path()).await;
        assert!(matches!(unknown, Err(DatastoreError::Weather(_))));
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_validation_error() {
        let file = json_file("{not json");
        let err = read_json::<WeatherStation>(file.path()).unwrap_err();
        assert!(matches!(err, DatastoreError::Validation(_)));
    }
}
