//! SQLCipher key configuration
//!
//! Applied as the first statement on every pooled connection when the
//! database is configured with an encryption key.

use rusqlite::Connection;
use tracing::{debug, error};
use zeroize::Zeroizing;

use crate::storage::error::{StorageError, StorageResult};

/// SQLCipher configuration
#[derive(Clone)]
pub struct SqlCipherConfig {
    /// Encryption key, zeroized on drop
    key: Zeroizing<String>,

    /// Cipher compatibility version (default: 4 for SQLCipher 4.x)
    pub cipher_compatibility: i32,

    /// KDF iterations for key derivation (default: 256000)
    pub kdf_iter: i32,
}

// Custom Debug impl to avoid exposing the key
impl std::fmt::Debug for SqlCipherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlCipherConfig")
            .field("key", &"***")
            .field("cipher_compatibility", &self.cipher_compatibility)
            .field("kdf_iter", &self.kdf_iter)
            .finish()
    }
}

impl SqlCipherConfig {
    /// Create default configuration with the given key
    pub fn new(key: String) -> Self {
        Self { key: Zeroizing::new(key), cipher_compatibility: 4, kdf_iter: 256_000 }
    }
}

/// Configure SQLCipher for a connection
///
/// Must be called immediately after opening the connection.
///
/// # Errors
/// Returns an error if any pragma fails to apply
pub fn configure_sqlcipher(conn: &Connection, config: &SqlCipherConfig) -> StorageResult<()> {
    conn.pragma_update(None, "key", config.key.as_str()).map_err(|e| {
        error!(error = %e, "SQLCipher key setup failed");
        classify_key_error(&e)
            .unwrap_or_else(|| StorageError::Encryption(format!("Failed to set key: {e}")))
    })?;

    conn.pragma_update(None, "cipher_compatibility", config.cipher_compatibility).map_err(|e| {
        StorageError::Encryption(format!("Failed to set cipher_compatibility: {e}"))
    })?;

    conn.pragma_update(None, "kdf_iter", config.kdf_iter)
        .map_err(|e| StorageError::Encryption(format!("Failed to set kdf_iter: {e}")))?;

    debug!("SQLCipher configuration successful");
    Ok(())
}

/// Verify that the database can be read with the configured key
///
/// Reads the schema table, which forces SQLCipher to decrypt the first page.
///
/// # Errors
/// Returns `WrongKeyOrNotEncrypted` if the key is wrong or the file is not an
/// encrypted database
pub fn verify_encryption(conn: &Connection) -> StorageResult<()> {
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(())).map_err(|e| {
        error!(error = %e, "Encryption verification failed");
        classify_key_error(&e).unwrap_or_else(|| StorageError::from(e))
    })
}

fn classify_key_error(err: &rusqlite::Error) -> Option<StorageError> {
    let lower = err.to_string().to_lowercase();
    let wrong_key = lower.contains("file is not a database")
        || lower.contains("file is encrypted")
        || lower.contains("database disk image is malformed")
        || lower.contains("notadb");
    wrong_key.then_some(StorageError::WrongKeyOrNotEncrypted)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn debug_output_hides_key() {
        let config = SqlCipherConfig::new("super-secret".to_string());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("cipher_compatibility"));
    }

    #[test]
    fn keyed_database_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("keyed.db");
        let config = SqlCipherConfig::new("test_key".to_string());

        let conn = Connection::open(&db_path).unwrap();
        configure_sqlcipher(&conn, &config).unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        drop(conn);

        let reopened = Connection::open(&db_path).unwrap();
        configure_sqlcipher(&reopened, &config).unwrap();
        verify_encryption(&reopened).unwrap();
    }

    #[test]
    fn wrong_key_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("keyed.db");

        let conn = Connection::open(&db_path).unwrap();
        configure_sqlcipher(&conn, &SqlCipherConfig::new("right".to_string())).unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        drop(conn);

        let reopened = Connection::open(&db_path).unwrap();
        configure_sqlcipher(&reopened, &SqlCipherConfig::new("wrong".to_string())).unwrap();
        let err = verify_encryption(&reopened).unwrap_err();
        assert!(matches!(err, StorageError::WrongKeyOrNotEncrypted));
    }
}
