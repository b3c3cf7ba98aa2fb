//! # iot-core
//!
//! Core types and utilities for IoT Sensors RS.
//!
//! This crate provides the foundational building blocks used across all other crates:
//! - Error taxonomy for filter validation and SQL template splicing
//! - Offset pagination controller (limit/offset resolution, `Link` headers)
//! - Configuration types

pub mod config;
pub mod error;
pub mod pagination;

pub use error::*;
pub use pagination::*;
