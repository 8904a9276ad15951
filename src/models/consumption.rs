use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::models::{EnergyUnit, FuelType};

/// Describes one metered consumption series
/// Maps to `consumption_metadata` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ConsumptionMetadata {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub fuel_type: FuelType,
    #[sqlx(try_from = "String")]
    pub energy_unit: EnergyUnit,
    #[serde(rename = "project")]
    pub project_id: Option<i64>,
    pub added: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// A reading that starts at `start` and runs until the next record's start
/// Maps to `consumption_records` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ConsumptionRecord {
    pub id: i64,
    #[serde(skip_serializing)]
    pub metadata_id: i64,
    pub start: DateTime<Utc>,
    pub value: Option<f64>,
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConsumptionRecord {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub estimated: bool,
}

/// Writable consumption fields with optional nested records
///
/// On update, `records: None` keeps the stored records and `Some` replaces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConsumptionMetadata {
    pub fuel_type: FuelType,
    pub energy_unit: EnergyUnit,
    #[serde(default, rename = "project")]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub records: Option<Vec<NewConsumptionRecord>>,
}

/// Metadata together with its records, ordered by start
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionDetail {
    #[serde(flatten)]
    pub metadata: ConsumptionMetadata,
    pub records: Vec<ConsumptionRecord>,
}

const METADATA_COLUMNS: &str = "id, fuel_type, energy_unit, project_id, added, updated";
const RECORD_COLUMNS: &str = "id, metadata_id, start, value, estimated";

impl ConsumptionMetadata {
    pub async fn create(
        pool: &PgPool,
        fields: &NewConsumptionMetadata,
    ) -> Result<ConsumptionDetail, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO consumption_metadata (fuel_type, energy_unit, project_id)
            VALUES ($1, $2, $3)
            RETURNING {METADATA_COLUMNS}
            "#
        );
        let metadata = sqlx::query_as::<_, ConsumptionMetadata>(&sql)
            .bind(fields.fuel_type.code())
            .bind(fields.energy_unit.code())
            .bind(fields.project_id)
            .fetch_one(&mut *tx)
            .await?;

        let records = match &fields.records {
            Some(records) => insert_records(&mut tx, metadata.id, records).await?,
            None => Vec::new(),
        };

        tx.commit().await?;
        Ok(ConsumptionDetail { metadata, records })
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<ConsumptionMetadata>, sqlx::Error> {
        let sql = format!("SELECT {METADATA_COLUMNS} FROM consumption_metadata WHERE id = $1");
        sqlx::query_as::<_, ConsumptionMetadata>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<ConsumptionMetadata>, sqlx::Error> {
        let sql = format!("SELECT {METADATA_COLUMNS} FROM consumption_metadata ORDER BY id");
        sqlx::query_as::<_, ConsumptionMetadata>(&sql)
            .fetch_all(pool)
            .await
    }

    pub async fn list_for_project(
        pool: &PgPool,
        project_id: i64,
    ) -> Result<Vec<ConsumptionMetadata>, sqlx::Error> {
        let sql = format!(
            "SELECT {METADATA_COLUMNS} FROM consumption_metadata WHERE project_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, ConsumptionMetadata>(&sql)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    pub async fn records(&self, pool: &PgPool) -> Result<Vec<ConsumptionRecord>, sqlx::Error> {
        ConsumptionRecord::list_for_metadata(pool, self.id).await
    }

    pub async fn with_records(self, pool: &PgPool) -> Result<ConsumptionDetail, sqlx::Error> {
        let records = self.records(pool).await?;
        Ok(ConsumptionDetail {
            metadata: self,
            records,
        })
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        fields: &NewConsumptionMetadata,
    ) -> Result<Option<ConsumptionDetail>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE consumption_metadata
            SET fuel_type = $1, energy_unit = $2, project_id = $3, updated = NOW()
            WHERE id = $4
            RETURNING {METADATA_COLUMNS}
            "#
        );
        let Some(metadata) = sqlx::query_as::<_, ConsumptionMetadata>(&sql)
            .bind(fields.fuel_type.code())
            .bind(fields.energy_unit.code())
            .bind(fields.project_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        if let Some(records) = &fields.records {
            sqlx::query("DELETE FROM consumption_records WHERE metadata_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_records(&mut tx, id, records).await?;
        }

        tx.commit().await?;
        Ok(Some(metadata.with_records(pool).await?))
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM consumption_metadata WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl ConsumptionRecord {
    pub async fn list_for_metadata(
        pool: &PgPool,
        metadata_id: i64,
    ) -> Result<Vec<ConsumptionRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM consumption_records WHERE metadata_id = $1 ORDER BY start, id"
        );
        sqlx::query_as::<_, ConsumptionRecord>(&sql)
            .bind(metadata_id)
            .fetch_all(pool)
            .await
    }
}

async fn insert_records(
    tx: &mut Transaction<'_, Postgres>,
    metadata_id: i64,
    records: &[NewConsumptionRecord],
) -> Result<Vec<ConsumptionRecord>, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO consumption_records (metadata_id, start, value, estimated)
        VALUES ($1, $2, $3, $4)
        RETURNING {RECORD_COLUMNS}
        "#
    );

    let mut inserted = Vec::with_capacity(records.len());
    for record in records {
        let row = sqlx::query_as::<_, ConsumptionRecord>(&sql)
            .bind(metadata_id)
            .bind(record.start)
            .bind(record.value)
            .bind(record.estimated)
            .fetch_one(&mut **tx)
            .await?;
        inserted.push(row);
    }
    inserted.sort_by_key(|r| (r.start, r.id));
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_create_payload_parsing() {
        let payload: NewConsumptionMetadata = serde_json::from_value(serde_json::json!({
            "fuel_type": "E",
            "energy_unit": "KWH",
            "records": [{
                "start": "2014-01-01T00:00:00+00:00",
                "value": 0,
                "estimated": false,
            }],
        }))
        .unwrap();

        assert_eq!(payload.fuel_type, FuelType::Electricity);
        assert_eq!(payload.project_id, None);
        let records = payload.records.unwrap();
        assert_eq!(records[0].start, Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(records[0].value, Some(0.0));
    }

    #[test]
    fn test_invalid_fuel_type_is_rejected() {
        let result: Result<NewConsumptionMetadata, _> = serde_json::from_value(serde_json::json!({
            "fuel_type": "OIL",
            "energy_unit": "KWH",
        }));
        assert!(result.is_err());
    }

    #[sqlx::test(migrator = "crate::database::MIGRATOR")]
    async fn test_consumption_create_update_delete(pool: PgPool) -> sqlx::Result<()> {
        let start = Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap();
        let fields = NewConsumptionMetadata {
            fuel_type: FuelType::Electricity,
            energy_unit: EnergyUnit::KilowattHour,
            project_id: None,
            records: Some(vec![
                NewConsumptionRecord {
                    start: start + chrono::Duration::days(30),
                    value: Some(12.5),
                    estimated: true,
                },
                NewConsumptionRecord {
                    start,
                    value: None,
                    estimated: false,
                },
            ]),
        };

        let created = ConsumptionMetadata::create(&pool, &fields).await?;
        assert_eq!(created.records.len(), 2);
        assert_eq!(created.records[0].start, start);

        let serialized = serde_json::to_value(&created).unwrap();
        assert_eq!(serialized["fuel_type"], "E");
        assert_eq!(serialized["energy_unit"], "KWH");
        assert_eq!(serialized["project"], serde_json::Value::Null);
        assert_eq!(serialized["records"][0]["start"], "2014-01-01T00:00:00Z");

        let update = NewConsumptionMetadata {
            fuel_type: FuelType::NaturalGas,
            energy_unit: EnergyUnit::Therm,
            project_id: None,
            records: None,
        };
        let updated = ConsumptionMetadata::update(&pool, created.metadata.id, &update)
            .await?
            .expect("metadata exists");
        assert_eq!(updated.metadata.fuel_type, FuelType::NaturalGas);
        assert_eq!(updated.records.len(), 2);

        assert!(ConsumptionMetadata::delete(&pool, created.metadata.id).await?);
        assert!(ConsumptionRecord::list_for_metadata(&pool, created.metadata.id)
            .await?
            .is_empty());
        Ok(())
    }
}
