//! # CrmSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite/SQLCipher repositories for canonical entities, watermarks and
//!   relationship edges
//! - Provider staging tables and the registry that dispatches reads to them
//! - Configuration loading and tracing setup
//! - The trigger-driven sync worker
//!
//! ## Architecture
//! - Implements traits defined in `crmsync-core`
//! - Depends on `crmsync-common` for the connection pool
//! - Contains all "impure" code (I/O, runtime tasks)

pub mod config;
pub mod database;
pub mod errors;
pub mod observability;
pub mod staging;
pub mod sync;

// Re-export commonly used items
pub use database::{
    DbManager, SqliteCanonicalRepository, SqliteRelationshipRepository, SqliteWatermarkRepository,
};
pub use errors::InfraError;
pub use observability::init_tracing;
pub use staging::{SqliteStagingTable, StagedRecordSource, StagingRegistry};
pub use sync::{build_service, open_database, SyncWorker, SyncWorkerConfig, SyncWorkerHandle};
