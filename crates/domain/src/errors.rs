//! Error types used throughout the sync pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for CrmSync
///
/// Anything that reaches a run boundary is one of these. A run that returns
/// an error never advances its watermark.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CrmSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transform failed for record {external_id}: {source}")]
    Transform { external_id: String, source: TransformError },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CrmSyncError {
    /// Whether retrying the same run later can succeed without a config or
    /// data change
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}

/// A single record's raw fields did not satisfy the mapper's declared contract
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformError {
    #[error("field '{field}' is not a number: {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error("field '{field}' normalises to {value}, outside [0.0, 1.0]")]
    OutOfRange { field: String, value: f64 },

    #[error("field '{field}' has unsupported type {found}")]
    UnexpectedType { field: String, found: String },

    #[error("required field '{field}' is absent or null")]
    MissingRequired { field: String },
}

impl TransformError {
    /// The raw field the failure refers to
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidNumber { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::UnexpectedType { field, .. }
            | Self::MissingRequired { field } => field,
        }
    }
}

/// Result type alias for CrmSync operations
pub type Result<T> = std::result::Result<T, CrmSyncError>;
