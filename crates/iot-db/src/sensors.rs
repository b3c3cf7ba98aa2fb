//! Sensor repository
//!
//! Sensors live in the `devices` table.

use iot_queries::{ColumnMap, RequestScope};
use sqlx::{FromRow, PgPool};

use crate::repository::{fetch_filtered, RepositoryError, RepositoryResult};

pub const SENSOR_RESOURCE: &str = "sensor";

const INSERT_SENSOR: &str = r#"
    INSERT INTO devices (id, type, alias, rate, max_threshold, min_threshold, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7);"#;

const REPLACE_SENSOR: &str = r#"
    UPDATE devices
    SET type=$2, alias=$3, rate=$4, max_threshold=$5, min_threshold=$6, updated_at=$7
    WHERE id=$1;"#;

const DELETE_SENSOR: &str = r#"
    DELETE FROM devices
    WHERE id=$1;"#;

const GET_SENSORS: &str = r#"
    SELECT id, type, alias, rate, max_threshold, min_threshold, updated_at
    FROM devices;"#;

/// Sensor database entity
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SensorRow {
    pub id: String,
    #[sqlx(rename = "type")]
    pub sensor_type: String,
    pub alias: String,
    pub rate: i32,
    pub max_threshold: f32,
    pub min_threshold: f32,
    /// Unix seconds
    pub updated_at: i64,
}

/// DTO for creating or replacing a sensor
#[derive(Debug, Clone)]
pub struct SensorDto {
    pub id: String,
    pub sensor_type: String,
    pub alias: String,
    pub rate: i32,
    pub max_threshold: f32,
    pub min_threshold: f32,
}

impl SensorDto {
    fn into_row(self) -> SensorRow {
        SensorRow {
            id: self.id,
            sensor_type: self.sensor_type,
            alias: self.alias,
            rate: self.rate,
            max_threshold: self.max_threshold,
            min_threshold: self.min_threshold,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Column whitelist of `GET /sensors`
pub fn list_columns() -> ColumnMap {
    ColumnMap::new()
        .filter("id", "id")
        .filter("type", "type")
        .filter("alias", "alias")
        .order("id", "id")
        .order("type", "type")
        .order("alias", "alias")
        .order("updatedAt", "updated_at")
}

/// Sensor repository implementation
#[derive(Clone)]
pub struct SensorRepository {
    pool: PgPool,
}

impl SensorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new sensor, stamping `updated_at`
    pub async fn create(&self, dto: SensorDto) -> RepositoryResult<SensorRow> {
        tracing::debug!(id = %dto.id, "writing new sensor to devices table");

        let row = dto.into_row();
        self.write(INSERT_SENSOR, &row).await?;
        Ok(row)
    }

    /// Overwrite every field of an existing sensor
    pub async fn replace(&self, dto: SensorDto) -> RepositoryResult<SensorRow> {
        tracing::debug!(id = %dto.id, "replacing sensor in devices table");

        let row = dto.into_row();
        if self.write(REPLACE_SENSOR, &row).await? == 0 {
            return Err(RepositoryError::NotFound {
                resource: SENSOR_RESOURCE,
                id: row.id,
            });
        }
        Ok(row)
    }

    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        tracing::debug!(id = %id, "deleting sensor from devices table");

        let result = sqlx::query(DELETE_SENSOR)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, SENSOR_RESOURCE, id))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                resource: SENSOR_RESOURCE,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Sensors matching the scope's filters; the total is recorded on the scope
    pub async fn list(&self, scope: &mut RequestScope) -> RepositoryResult<Vec<SensorRow>> {
        tracing::debug!("getting sensors in repository");
        fetch_filtered(&self.pool, SENSOR_RESOURCE, GET_SENSORS, &list_columns(), scope).await
    }

    async fn write(&self, sql: &str, row: &SensorRow) -> RepositoryResult<u64> {
        let result = sqlx::query(sql)
            .bind(&row.id)
            .bind(&row.sensor_type)
            .bind(&row.alias)
            .bind(row.rate)
            .bind(row.max_threshold)
            .bind(row.min_threshold)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, SENSOR_RESOURCE, &row.id))?;

        Ok(result.rows_affected())
    }
}
