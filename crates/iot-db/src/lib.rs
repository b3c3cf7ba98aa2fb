//! # iot-db
//!
//! Database layer for IoT Sensors RS.
//!
//! This crate provides PostgreSQL database access using SQLx, including:
//!
//! - Connection pool management
//! - Sensor CRUD against the `devices` table
//! - Filtered, counted and paginated listing of sensors and metrics
//!
//! ## Example
//!
//! ```ignore
//! use iot_db::{Database, SensorRepository};
//! use iot_queries::RequestScope;
//!
//! let db = Database::connect(&config.database).await?;
//! let repo = SensorRepository::new(db.pool().clone());
//!
//! let mut scope = RequestScope::new().with_filter(group).with_pagination(paginator);
//! let sensors = repo.list(&mut scope).await?;
//! ```

pub mod metrics;
pub mod pool;
pub mod repository;
pub mod sensors;

// Re-exports
pub use metrics::{MetricRepository, MetricRow};
pub use pool::{Database, PoolStats};
pub use repository::{RepositoryError, RepositoryResult};
pub use sensors::{SensorDto, SensorRepository, SensorRow};
