//! SQLCipher connection pool
//!
//! Provides r2d2-based connection pooling. Every pooled connection gets the
//! (optional) encryption key and the connection pragmas applied on open.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::cipher::{configure_sqlcipher, verify_encryption, SqlCipherConfig};
use super::config::SqlCipherPoolConfig;
use super::connection::SqlCipherConnection;
use super::pragmas::apply_connection_pragmas;
use crate::storage::error::{StorageError, StorageResult};

/// Point-in-time pool state, for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// Open connections (idle + in use)
    pub connections: u32,
    /// Idle connections
    pub idle_connections: u32,
    /// Configured maximum
    pub max_size: u32,
}

/// SQLite connection pool
#[derive(Debug)]
pub struct SqlCipherPool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlCipherPoolConfig,
    encrypted: bool,
}

impl SqlCipherPool {
    /// Create a new connection pool
    ///
    /// # Arguments
    /// * `path` - Path to the database file
    /// * `encryption_key` - SQLCipher key; `None` opens a plain SQLite file
    /// * `config` - Pool configuration
    ///
    /// # Errors
    /// Returns an error if:
    /// - Database file can't be accessed
    /// - Encryption key is wrong
    /// - Pool creation fails
    #[instrument(skip(encryption_key), fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(
        path: &Path,
        encryption_key: Option<String>,
        config: SqlCipherPoolConfig,
    ) -> StorageResult<Self> {
        info!("Creating connection pool");

        let cipher_config = encryption_key.map(SqlCipherConfig::new);
        let encrypted = cipher_config.is_some();
        let pool_config = config.clone();

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if let Some(cipher) = &cipher_config {
                configure_sqlcipher(conn, cipher)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            }

            apply_connection_pragmas(conn, &pool_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!("Failed to create connection pool: {}", e);
                classify_pool_error(&e, "Failed to create pool")
            })?;

        {
            let conn = pool.get().map_err(|e| {
                warn!("Failed to get test connection: {}", e);
                classify_pool_error(&e, "Failed to get test connection")
            })?;

            verify_encryption(&conn)?;
            debug!(encrypted, "Database readable with configured key");
        }

        info!(encrypted, "Connection pool created with {} connections", config.max_size);

        Ok(Self { pool, config, encrypted })
    }

    /// Get a connection from the pool
    #[instrument(skip(self), fields(pool_size = self.config.max_size))]
    pub fn get_sqlcipher_connection(&self) -> StorageResult<SqlCipherConnection> {
        let start = std::time::Instant::now();

        match self.pool.get() {
            Ok(conn) => {
                debug!("Connection acquired in {}ms", start.elapsed().as_millis());
                Ok(SqlCipherConnection::new(conn))
            }
            Err(e) => {
                let err_str = e.to_string().to_lowercase();

                if err_str.contains("timeout") || err_str.contains("timed out") {
                    warn!("Connection timeout after {:?}", self.config.connection_timeout);
                    Err(StorageError::Timeout(self.config.connection_timeout.as_secs()))
                } else {
                    warn!("Connection error: {}", e);
                    Err(StorageError::Connection(format!("Failed to get connection: {e}")))
                }
            }
        }
    }

    /// Current pool occupancy
    pub fn state(&self) -> PoolState {
        let state = self.pool.state();
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
            max_size: self.config.max_size,
        }
    }

    /// Whether the pool was opened with an encryption key
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }
}

fn classify_pool_error(err: &r2d2::Error, context: &str) -> StorageError {
    let err_str = err.to_string().to_lowercase();
    if err_str.contains("file is not a database")
        || err_str.contains("file is encrypted")
        || err_str.contains("notadb")
    {
        StorageError::WrongKeyOrNotEncrypted
    } else {
        StorageError::Connection(format!("{context}: {err}"))
    }
}
