use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Weather station with a known position
/// Maps to `weather_stations` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WeatherStation {
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Geographic center of a zipcode
/// Maps to `zipcode_centroids` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ZipcodeCentroid {
    pub zipcode: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Mean daily temperature observed at a station
/// Maps to `daily_temperatures` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailyTemperature {
    pub station: String,
    pub date: NaiveDate,
    pub temperature_f: f64,
}

impl WeatherStation {
    pub async fn upsert(pool: &PgPool, station: &WeatherStation) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO weather_stations (station, latitude, longitude)
            VALUES ($1, $2, $3)
            ON CONFLICT (station) DO UPDATE
            SET latitude = EXCLUDED.latitude, longitude = EXCLUDED.longitude
            "#,
        )
        .bind(&station.station)
        .bind(station.latitude)
        .bind(station.longitude)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find(pool: &PgPool, station: &str) -> Result<Option<WeatherStation>, sqlx::Error> {
        sqlx::query_as::<_, WeatherStation>(
            "SELECT station, latitude, longitude FROM weather_stations WHERE station = $1",
        )
        .bind(station)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<WeatherStation>, sqlx::Error> {
        sqlx::query_as::<_, WeatherStation>(
            "SELECT station, latitude, longitude FROM weather_stations ORDER BY station",
        )
        .fetch_all(pool)
        .await
    }
}

impl ZipcodeCentroid {
    pub async fn upsert(pool: &PgPool, centroid: &ZipcodeCentroid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO zipcode_centroids (zipcode, latitude, longitude)
            VALUES ($1, $2, $3)
            ON CONFLICT (zipcode) DO UPDATE
            SET latitude = EXCLUDED.latitude, longitude = EXCLUDED.longitude
            "#,
        )
        .bind(&centroid.zipcode)
        .bind(centroid.latitude)
        .bind(centroid.longitude)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find(pool: &PgPool, zipcode: &str) -> Result<Option<ZipcodeCentroid>, sqlx::Error> {
        sqlx::query_as::<_, ZipcodeCentroid>(
            "SELECT zipcode, latitude, longitude FROM zipcode_centroids WHERE zipcode = $1",
        )
        .bind(zipcode)
        .fetch_optional(pool)
        .await
    }
}

impl DailyTemperature {
    /// Insert or replace observations; returns the number of rows written
    pub async fn upsert_many(pool: &PgPool, observations: &[DailyTemperature]) -> Result<u64, sqlx::Error> {
        if observations.is_empty() {
            return Ok(0);
        }

        let stations: Vec<&str> = observations.iter().map(|o| o.station.as_str()).collect();
        let dates: Vec<NaiveDate> = observations.iter().map(|o| o.date).collect();
        let temperatures: Vec<f64> = observations.iter().map(|o| o.temperature_f).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO daily_temperatures (station, date, temperature_f)
            SELECT * FROM UNNEST($1::varchar[], $2::date[], $3::float8[])
            ON CONFLICT (station, date) DO UPDATE
            SET temperature_f = EXCLUDED.temperature_f
            "#,
        )
        .bind(&stations)
        .bind(&dates)
        .bind(&temperatures)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Observations for `station` with `start <= date <= end`, ordered by date
    pub async fn list_range(
        pool: &PgPool,
        station: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyTemperature>, sqlx::Error> {
        sqlx::query_as::<_, DailyTemperature>(
            r#"
            SELECT station, date, temperature_f
            FROM daily_temperatures
            WHERE station = $1 AND date BETWEEN $2 AND $3
            ORDER BY date
            "#,
        )
        .bind(station)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrator = "crate::database::MIGRATOR")]
    async fn test_temperature_upsert_and_range(pool: PgPool) -> sqlx::Result<()> {
        WeatherStation::upsert(
            &pool,
            &WeatherStation {
                station: "722880".to_string(),
                latitude: 34.2,
                longitude: -118.35,
            },
        )
        .await?;

        let day = |d| NaiveDate::from_ymd_opt(2014, 1, d).unwrap();
        let observations: Vec<DailyTemperature> = (1..=5)
            .map(|d| DailyTemperature {
                station: "722880".to_string(),
                date: day(d),
                temperature_f: 50.0 + d as f64,
            })
            .collect();
        assert_eq!(DailyTemperature::upsert_many(&pool, &observations).await?, 5);

        let replaced = DailyTemperature {
            station: "722880".to_string(),
            date: day(3),
            temperature_f: 70.0,
        };
        DailyTemperature::upsert_many(&pool, &[replaced]).await?;

        let range = DailyTemperature::list_range(&pool, "722880", day(2), day(4)).await?;
        assert_eq!(range.len(), 3);
        assert_eq!(range[1].temperature_f, 70.0);
        Ok(())
    }
}
