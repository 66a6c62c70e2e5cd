//! Sync worker error types

use crmsync_domain::CrmSyncError;
use thiserror::Error;

use crate::errors::InfraError;

/// Lifecycle and submission errors of the [`SyncWorker`](super::SyncWorker)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Sync worker already running")]
    AlreadyRunning,

    #[error("Sync worker not running")]
    NotRunning,

    /// The worker stopped while the event was being submitted
    #[error("Sync worker queue closed")]
    QueueClosed,

    #[error("Sync worker did not stop within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Sync worker task failed: {0}")]
    TaskFailed(String),
}

impl From<WorkerError> for InfraError {
    fn from(err: WorkerError) -> Self {
        let domain = match err {
            WorkerError::AlreadyRunning | WorkerError::NotRunning => {
                CrmSyncError::InvalidInput(err.to_string())
            }
            _ => CrmSyncError::Internal(err.to_string()),
        };
        InfraError(domain)
    }
}

impl From<WorkerError> for CrmSyncError {
    fn from(err: WorkerError) -> Self {
        InfraError::from(err).into()
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;
