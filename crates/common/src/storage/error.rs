//! Storage error types

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Database encryption error: {0}")]
    Encryption(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Wrong encryption key or database not encrypted")]
    WrongKeyOrNotEncrypted,

    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    R2d2(#[from] r2d2::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Check if this error is retryable
    ///
    /// Pool timeouts, connection failures and SQLite BUSY/LOCKED are
    /// transient; everything else will fail again on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Rusqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }

    /// Returns true when the underlying SQLite error is "no rows returned".
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::Rusqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Check if this is a critical error requiring operator attention
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Encryption(_) | Self::Migration(_) | Self::WrongKeyOrNotEncrypted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_connection_errors_are_retryable() {
        assert!(StorageError::Timeout(5).is_retryable());
        assert!(StorageError::Connection("refused".into()).is_retryable());
        assert!(!StorageError::Query("syntax".into()).is_retryable());
    }

    #[test]
    fn no_rows_is_detected() {
        let err = StorageError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.is_no_rows());
        assert!(!StorageError::Timeout(1).is_no_rows());
    }

    #[test]
    fn wrong_key_is_critical() {
        assert!(StorageError::WrongKeyOrNotEncrypted.is_critical());
        assert!(!StorageError::Timeout(1).is_critical());
    }
}
