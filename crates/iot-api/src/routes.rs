//! API routes

use axum::{
    routing::{delete, get},
    Router,
};

use crate::extractors::AppState;
use crate::handlers::{metrics, sensors};

/// Create the complete API router
pub fn router() -> Router<AppState> {
    Router::new().nest("/api/v1", api_v1_router())
}

fn api_v1_router() -> Router<AppState> {
    Router::new()
        .nest("/sensors", sensors_router())
        .nest("/metrics", metrics_router())
}

fn sensors_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(sensors::list_sensors)
                .post(sensors::create_sensor)
                .put(sensors::replace_sensor),
        )
        .route("/:id", delete(sensors::delete_sensor))
}

fn metrics_router() -> Router<AppState> {
    Router::new().route("/", get(metrics::list_metrics))
}
