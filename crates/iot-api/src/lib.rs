//! # iot-api
//!
//! REST API v1 handlers for IoT Sensors RS.
//!
//! List endpoints accept `filters=field:op:value`, `sort`, `order`, `limit` and
//! `offset`, and answer with `Link` and `Total` headers.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod listing;
pub mod routes;

pub use extractors::AppState;
pub use routes::router;
