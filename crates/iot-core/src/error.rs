//! Core error types for IoT Sensors RS
//!
//! Client-caused problems (bad filter tokens, unknown fields, coercion failures)
//! are collected into [`ValidationErrors`] and reported together. Defects in a
//! SQL template authored by the persistence layer are a [`TemplateError`].

use std::fmt;
use thiserror::Error;

/// A single problem found while validating a request's filter or order parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Malformed filter string: '{token}', (correct: 'field:op:value')")]
    Malformed { token: String },

    #[error("Invalid filter value: '{value}'")]
    InvalidValue { value: String },

    #[error("Unknown filter field: '{field}', fields: {allowed}")]
    UnknownField { field: String, allowed: String },

    #[error("Unknown filter operation: '{operation}', operations: {allowed}")]
    UnknownOperation { operation: String, allowed: String },

    #[error("Operation: '{operation}' not allowed for filter type '{value_type}'")]
    OperationNotAllowed {
        operation: String,
        value_type: String,
    },

    #[error("Field: '{field}' not allowed for ordering. Fields: {allowed}")]
    OrderNotAllowed { field: String, allowed: String },

    #[error("order can only be 'asc' or 'desc', got '{direction}'")]
    InvalidDirection { direction: String },

    #[error("error parsing {expected} value '{value}'")]
    Coercion {
        value: String,
        expected: &'static str,
    },
}

/// Ordered collection of every validation problem found in one request
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FilterError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FilterError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FilterError] {
        &self.errors
    }

    /// One message per problem, in the order they were found
    pub fn full_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// `Ok(value)` when nothing was collected, otherwise the whole aggregate
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join("\n"))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<FilterError> for ValidationErrors {
    fn from(error: FilterError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl FromIterator<FilterError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = FilterError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

/// Structural defect in a SQL template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("FROM not found in query: {template}")]
    MissingFrom { template: String },
}

/// Error returned by the compile+splice entry point
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Malformed query template: {0}")]
    Template(#[from] TemplateError),
}

impl QueryError {
    /// Whether the caller's input (rather than our own SQL) caused the failure
    pub fn is_client_error(&self) -> bool {
        matches!(self, QueryError::Validation(_))
    }
}
