//! Metric repository
//!
//! Read-only access to sensor readings in the `metrics` table.

use iot_queries::{ColumnMap, RequestScope};
use sqlx::{FromRow, PgPool};

use crate::repository::{fetch_filtered, RepositoryResult};

pub const METRIC_RESOURCE: &str = "metric";

const GET_METRICS: &str = r#"
    SELECT sensor_id, value, unit, timestamp
    FROM metrics;"#;

/// Metric database entity
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MetricRow {
    pub sensor_id: String,
    pub value: f32,
    pub unit: String,
    pub timestamp: i64,
}

/// Column whitelist of `GET /metrics`
pub fn list_columns() -> ColumnMap {
    ColumnMap::new()
        .filter("sensorId", "sensor_id")
        .filter("timestamp", "timestamp")
        .order("value", "value")
        .order("timestamp", "timestamp")
}

#[derive(Clone)]
pub struct MetricRepository {
    pool: PgPool,
}

impl MetricRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, scope: &mut RequestScope) -> RepositoryResult<Vec<MetricRow>> {
        tracing::debug!("getting metrics in repository");
        fetch_filtered(&self.pool, METRIC_RESOURCE, GET_METRICS, &list_columns(), scope).await
    }
}
