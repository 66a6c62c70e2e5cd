//! Storage primitives for the canonical, watermark and staging databases
//!
//! The pool always links SQLCipher. When no key is configured the database is
//! a plain SQLite file; with a key every page is encrypted at rest.

pub mod error;
pub mod sqlcipher;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use sqlcipher::{
    apply_connection_pragmas, SqlCipherConnection, SqlCipherPool, SqlCipherPoolConfig,
    SqlCipherStatement,
};
