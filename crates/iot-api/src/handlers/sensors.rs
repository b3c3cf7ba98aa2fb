//! Sensors API handlers

use std::borrow::Cow;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use iot_db::{SensorDto, SensorRepository, SensorRow};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{ApiError, ApiResult};
use crate::extractors::{AppState, ListRequest, ValidatedJson};

pub const SENSOR_TYPES: [&str; 3] = ["humidity", "temperature", "pressure"];

/// Create a sensor
///
/// POST /api/v1/sensors
pub async fn create_sensor(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SensorBody>,
) -> ApiResult<impl IntoResponse> {
    let repo = SensorRepository::new(state.database()?.pool().clone());
    let row = repo.create(body.into()).await?;

    Ok((StatusCode::CREATED, Json(SensorResponse::from(row))))
}

/// Replace a sensor
///
/// PUT /api/v1/sensors
pub async fn replace_sensor(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SensorBody>,
) -> ApiResult<impl IntoResponse> {
    let repo = SensorRepository::new(state.database()?.pool().clone());
    let row = repo.replace(body.into()).await?;

    Ok(Json(SensorResponse::from(row)))
}

/// List sensors
///
/// GET /api/v1/sensors
pub async fn list_sensors(
    State(state): State<AppState>,
    request: ListRequest,
) -> ApiResult<impl IntoResponse> {
    let endpoint = &state.endpoints.sensors;
    let mut scope = endpoint.begin(&request)?;

    let repo = SensorRepository::new(state.database()?.pool().clone());
    let rows = repo.list(&mut scope).await?;

    let elements: Vec<SensorResponse> = rows.into_iter().map(SensorResponse::from).collect();
    Ok((endpoint.finish(&request, &scope), Json(elements)))
}

/// Delete a sensor
///
/// DELETE /api/v1/sensors/:id
pub async fn delete_sensor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    validate_uuid(&id).map_err(|_| ApiError::not_found(format!("sensor with id {} not found", id)))?;

    let repo = SensorRepository::new(state.database()?.pool().clone());
    repo.delete(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// Request/Response types

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SensorBody {
    #[serde(rename = "Id")]
    #[validate(custom = "validate_uuid")]
    pub id: String,
    #[serde(rename = "type")]
    #[validate(custom = "validate_sensor_type")]
    pub sensor_type: String,
    #[validate(custom = "validate_alias")]
    pub alias: String,
    pub rate: i32,
    pub max_threshold: f32,
    pub min_threshold: f32,
}

impl From<SensorBody> for SensorDto {
    fn from(body: SensorBody) -> Self {
        SensorDto {
            id: body.id,
            sensor_type: body.sensor_type,
            alias: body.alias,
            rate: body.rate,
            max_threshold: body.max_threshold,
            min_threshold: body.min_threshold,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorResponse {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub alias: String,
    pub rate: i32,
    pub max_threshold: f32,
    pub min_threshold: f32,
    pub updated_at: i64,
}

impl From<SensorRow> for SensorResponse {
    fn from(row: SensorRow) -> Self {
        Self {
            id: row.id,
            sensor_type: row.sensor_type,
            alias: row.alias,
            rate: row.rate,
            max_threshold: row.max_threshold,
            min_threshold: row.min_threshold,
            updated_at: row.updated_at,
        }
    }
}

fn invalid(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));
    error
}

/// RFC 4122 textual form
fn validate_uuid(id: &str) -> Result<(), ValidationError> {
    let hyphenated = id.len() == 36 && uuid::Uuid::try_parse(id).is_ok();
    if hyphenated {
        Ok(())
    } else {
        Err(invalid("uuid", format!("'{}' is not a valid UUID", id)))
    }
}

/// 1 to 128 characters, no surrounding whitespace
fn validate_alias(alias: &str) -> Result<(), ValidationError> {
    let length = alias.chars().count();
    if length == 0 || length > 128 || alias.trim() != alias {
        return Err(invalid(
            "alias",
            "alias must have 1 to 128 characters and no leading or trailing spaces".to_string(),
        ));
    }
    Ok(())
}

fn validate_sensor_type(sensor_type: &str) -> Result<(), ValidationError> {
    if SENSOR_TYPES.contains(&sensor_type) {
        Ok(())
    } else {
        Err(invalid(
            "type",
            format!("type must be one of {}", SENSOR_TYPES.join(", ")),
        ))
    }
}
