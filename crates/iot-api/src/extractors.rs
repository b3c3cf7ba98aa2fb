//! Axum extractors and shared state for API handlers

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, Method},
    Json,
};
use iot_core::config::AppConfig;
use iot_db::Database;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::listing::Endpoints;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub endpoints: Arc<Endpoints>,
    pub db: Option<Database>,
}

impl AppState {
    pub fn new(config: AppConfig, db: Option<Database>) -> Self {
        let endpoints = Endpoints::from_config(&config);
        Self {
            config: Arc::new(config),
            endpoints: Arc::new(endpoints),
            db,
        }
    }

    pub fn database(&self) -> ApiResult<&Database> {
        self.db
            .as_ref()
            .ok_or_else(|| ApiError::internal("Database not configured"))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default(), None)
    }
}

/// The parts of a list request the filter and pagination layers look at
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub method: Method,
    pub host: Option<String>,
    pub path: String,
    /// Still percent-encoded
    pub query: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ListRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()));

        Ok(ListRequest {
            method: parts.method.clone(),
            host,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
        })
    }
}

/// JSON body extractor with automatic validation
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        value
            .validate()
            .map_err(|e| ApiError::bad_request(format_validation_errors(&e)))?;
        Ok(Self(value))
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}
