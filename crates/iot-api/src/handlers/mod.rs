//! API request handlers

pub mod metrics;
pub mod sensors;

pub use metrics::*;
pub use sensors::*;
