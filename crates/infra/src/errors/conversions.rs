//! Conversions from storage and runtime errors into domain errors.

use crmsync_common::storage::StorageError;
use crmsync_domain::CrmSyncError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CrmSyncError);

impl From<InfraError> for CrmSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CrmSyncError> for InfraError {
    fn from(value: CrmSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoCrmSyncError {
    fn into_crmsync(self) -> CrmSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CrmSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCrmSyncError for SqlError {
    fn into_crmsync(self) -> CrmSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        fn looks_like_wrong_key(message: &str) -> bool {
            let lower = message.to_ascii_lowercase();
            lower.contains("not a database") || lower.contains("encrypted")
        }

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => CrmSyncError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        CrmSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        CrmSyncError::Database(format!("unique constraint violation: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CrmSyncError::Database("foreign key constraint violation".into())
                    }
                    (_, _) if looks_like_wrong_key(&message) => CrmSyncError::Config(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    _ => CrmSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CrmSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CrmSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                CrmSyncError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::InvalidPath(path) => CrmSyncError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CrmSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_crmsync())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → CrmSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCrmSyncError for StorageError {
    fn into_crmsync(self) -> CrmSyncError {
        match self {
            StorageError::Rusqlite(err) => err.into_crmsync(),
            StorageError::WrongKeyOrNotEncrypted | StorageError::Encryption(_) => {
                CrmSyncError::Config(self.to_string())
            }
            StorageError::InvalidConfig(msg) => CrmSyncError::Config(msg),
            StorageError::SerdeJson(err) => {
                CrmSyncError::Internal(format!("stored JSON is malformed: {err}"))
            }
            other => CrmSyncError::Database(other.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_crmsync())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json / JoinError → CrmSyncError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(CrmSyncError::Internal(format!("JSON encoding failed: {value}")))
    }
}

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        let message = if value.is_cancelled() {
            "blocking task cancelled".to_string()
        } else {
            format!("blocking task panicked: {value}")
        };
        InfraError(CrmSyncError::Internal(message))
    }
}

/// Map a storage failure raised inside a repository call
pub(crate) fn map_storage_error(err: StorageError) -> CrmSyncError {
    InfraError::from(err).into()
}

pub(crate) fn map_sql_error(err: SqlError) -> CrmSyncError {
    InfraError::from(err).into()
}

pub(crate) fn map_join_error(err: JoinError) -> CrmSyncError {
    InfraError::from(err).into()
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
