//! Error types for spaces, parameters, indexes and queries

use thiserror::Error;

use crate::query::QueryKind;

/// Result type alias for simspace operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Error types that can occur while building or querying an index
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Missing parameter: {key}")]
    MissingParam { key: String },

    #[error("Invalid value '{value}' for parameter {key}: expected {expected}")]
    InvalidParam {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Malformed parameter '{token}': expected key=value")]
    MalformedParam { token: String },

    #[error("Unknown parameters: {}", keys.join(", "))]
    UnknownParams { keys: Vec<String> },

    #[error("No such method: {name}")]
    UnknownMethod { name: String },

    #[error("Method {name} is already registered with a different constructor")]
    DuplicateMethod { name: String },

    #[error("Method {method} does not support {kind} queries")]
    UnsupportedQuery {
        method: &'static str,
        kind: QueryKind,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid object: {reason}")]
    InvalidObject { reason: String },

    #[error("Invalid dataset: {reason}")]
    InvalidDataset { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Index error: {0}")]
    IndexError(String),
}

impl SearchError {
    /// Shorthand for a failed parameter coercion or validation.
    pub fn invalid_param(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        SearchError::InvalidParam {
            key: key.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}
