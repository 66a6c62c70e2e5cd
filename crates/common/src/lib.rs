//! Shared infrastructure primitives for the CrmSync crates.
//!
//! Only storage lives here today: an r2d2 connection pool over SQLite built
//! with SQLCipher, the connection/statement wrappers repositories use, and
//! the storage error type. Nothing in this crate knows about CRM records.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod storage;

pub use storage::{StorageError, StorageResult};
