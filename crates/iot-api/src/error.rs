//! API error handling
//!
//! Every failure leaves the API as a JSON problem body carrying the HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use iot_core::error::{QueryError, ValidationErrors};
use iot_db::RepositoryError;
use serde::Serialize;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    /// Rejected filter, order or pagination parameters
    Validation(ValidationErrors),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Validation(errors) => ApiError::Validation(errors),
            QueryError::Template(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            RepositoryError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            RepositoryError::Constraint(msg) => ApiError::BadRequest(msg),
            RepositoryError::Query(e) => e.into(),
            RepositoryError::Database(e) => ApiError::Internal(format!("Database error: {}", e)),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    title: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let title = status.canonical_reason().unwrap_or("Error");

        let (detail, errors) = match self {
            ApiError::Validation(errors) => {
                tracing::warn!(problems = errors.len(), "rejected request parameters");
                ("validation failed".to_string(), errors.full_messages())
            }
            ApiError::Internal(msg) => {
                tracing::error!("{}", msg);
                ("Internal server error".to_string(), vec![])
            }
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Conflict(msg) => {
                (msg, vec![])
            }
        };

        let body = ErrorBody {
            status: status.as_u16(),
            title,
            detail,
            errors,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
