//! Health checks
//!
//! `/health` answers as long as the process runs; `/health/ready` also pings the
//! database.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use iot_db::Database;
use serde::Serialize;

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Database component health
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub response_time_ms: u64,
    pub pool_size: u32,
    pub idle_connections: usize,
}

/// Readiness report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    pub fn http_status(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Clone)]
pub struct HealthState {
    pub db: Option<Database>,
    pub started: Instant,
}

impl HealthState {
    pub fn new(db: Option<Database>) -> Self {
        Self {
            db,
            started: Instant::now(),
        }
    }

    pub async fn check(&self) -> HealthReport {
        let database = match &self.db {
            Some(db) => Some(check_database(db).await),
            None => None,
        };

        let status = match &database {
            Some(db) if db.status == HealthStatus::Unhealthy => HealthStatus::Unhealthy,
            _ => HealthStatus::Healthy,
        };

        HealthReport {
            status,
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: self.started.elapsed().as_secs(),
            database,
            timestamp: chrono::Utc::now(),
        }
    }
}

async fn check_database(db: &Database) -> DatabaseHealth {
    let start = Instant::now();
    let result = db.ping().await;
    let stats = db.stats();

    let (status, message) = match result {
        Ok(()) => (HealthStatus::Healthy, None),
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            (HealthStatus::Unhealthy, Some(e.to_string()))
        }
    };

    DatabaseHealth {
        status,
        message,
        response_time_ms: start.elapsed().as_millis() as u64,
        pool_size: stats.size,
        idle_connections: stats.idle,
    }
}

/// Liveness check
pub async fn liveness() -> &'static str {
    "OK"
}

/// Readiness check
pub async fn readiness(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.check().await;
    (report.http_status(), Json(report))
}
