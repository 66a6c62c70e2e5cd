//! Database connection manager backed by the shared SQLCipher pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crmsync_common::storage::sqlcipher::{PoolState, SqlCipherConnection, SqlCipherPool, SqlCipherPoolConfig};
use crmsync_domain::Result;
use rusqlite::params;
use tracing::info;

use crate::errors::{map_sql_error, map_storage_error};

pub(crate) const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that wraps an [`SqlCipherPool`].
pub struct DbManager {
    pool: Arc<SqlCipherPool>,
    path: PathBuf,
}

impl DbManager {
    /// Open (or create) the database at `db_path`.
    ///
    /// With `encryption_key` set the file is keyed through SQLCipher;
    /// without one it is a plain SQLite database.
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        pool_size: u32,
        encryption_key: Option<&str>,
    ) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let config = SqlCipherPoolConfig { max_size: pool_size.max(1), ..SqlCipherPoolConfig::default() };

        let pool = SqlCipherPool::new(&path, encryption_key.map(str::to_owned), config)
            .map_err(map_storage_error)?;

        info!(
            db_path = %path.display(),
            max_connections = pool.state().max_size,
            encrypted = pool.is_encrypted(),
            "sqlite pool initialised"
        );

        Ok(Self { pool: Arc::new(pool), path })
    }

    /// Borrow the underlying pool.
    pub fn pool(&self) -> &Arc<SqlCipherPool> {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqlCipherConnection> {
        self.pool.get_sqlcipher_connection().map_err(map_storage_error)
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn)?;
        info!(version = SCHEMA_VERSION, "schema applied");
        Ok(())
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pool_state(&self) -> PoolState {
        self.pool.state()
    }

    /// Acquire a connection and run `SELECT 1`.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0))
            .map_err(map_storage_error)?;
        Ok(())
    }
}

fn create_schema(conn: &SqlCipherConnection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
        params![SCHEMA_VERSION, super::columns::now_millis()],
    )
    .map_err(map_storage_error)?;
    Ok(())
}
