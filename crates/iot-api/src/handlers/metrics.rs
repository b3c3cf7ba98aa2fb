//! Metrics API handlers

use axum::{extract::State, response::IntoResponse, Json};
use iot_db::{MetricRepository, MetricRow};
use serde::Serialize;

use crate::error::ApiResult;
use crate::extractors::{AppState, ListRequest};

/// List metrics
///
/// GET /api/v1/metrics
pub async fn list_metrics(
    State(state): State<AppState>,
    request: ListRequest,
) -> ApiResult<impl IntoResponse> {
    let endpoint = &state.endpoints.metrics;
    let mut scope = endpoint.begin(&request)?;

    let repo = MetricRepository::new(state.database()?.pool().clone());
    let rows = repo.list(&mut scope).await?;

    let elements: Vec<MetricResponse> = rows.into_iter().map(MetricResponse::from).collect();
    Ok((endpoint.finish(&request, &scope), Json(elements)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResponse {
    pub sensor_id: String,
    pub value: f32,
    pub unit: String,
    pub timestamp: i64,
}

impl From<MetricRow> for MetricResponse {
    fn from(row: MetricRow) -> Self {
        Self {
            sensor_id: row.sensor_id,
            value: row.value,
            unit: row.unit,
            timestamp: row.timestamp,
        }
    }
}
