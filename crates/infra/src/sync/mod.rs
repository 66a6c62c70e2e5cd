//! Trigger consumption and service wiring

pub mod errors;
pub mod wiring;
pub mod worker;

pub use errors::{WorkerError, WorkerResult};
pub use wiring::{build_service, open_database};
pub use worker::{SyncWorker, SyncWorkerConfig, SyncWorkerHandle, WorkerStats};
