//! SQLCipher connection wrapper

use std::ops::{Deref, DerefMut};

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection as RusqliteConnection, Row, Statement as RusqliteStatement, ToSql};
use tracing::instrument;

use crate::storage::error::{StorageError, StorageResult};

/// Pooled connection wrapper
///
/// The connection is returned to the pool when dropped. Derefs to the
/// underlying rusqlite connection for anything the wrapper does not cover.
pub struct SqlCipherConnection {
    inner: PooledConnection<SqliteConnectionManager>,
}

impl SqlCipherConnection {
    /// Create a new connection wrapper from a pooled connection
    pub fn new(conn: PooledConnection<SqliteConnectionManager>) -> Self {
        Self { inner: conn }
    }

    /// Get a reference to the inner connection
    pub fn inner(&self) -> &RusqliteConnection {
        &self.inner
    }

    /// Execute a statement, returning the number of changed rows
    #[instrument(skip(self, params), fields(sql = %sql))]
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> StorageResult<usize> {
        self.inner.execute(sql, params).map_err(StorageError::from)
    }

    /// Execute a SQL query that returns a single row
    #[instrument(skip(self, params, f), fields(sql = %sql))]
    pub fn query_row<T, F>(&self, sql: &str, params: &[&dyn ToSql], f: F) -> StorageResult<T>
    where
        F: FnOnce(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        self.inner.query_row(sql, params, f).map_err(StorageError::from)
    }

    /// Prepare a SQL statement for efficient repeated execution
    #[instrument(skip(self), fields(sql = %sql))]
    pub fn prepare(&self, sql: &str) -> StorageResult<SqlCipherStatement<'_>> {
        let stmt = self.inner.prepare(sql).map_err(StorageError::from)?;

        Ok(SqlCipherStatement::new(stmt))
    }

    /// Begin an immediate transaction
    ///
    /// Immediate mode takes the write lock up front so two writers never both
    /// read a value and then race to update it.
    #[instrument(skip(self))]
    pub fn transaction(&mut self) -> StorageResult<rusqlite::Transaction<'_>> {
        self.inner
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(StorageError::from)
    }
}

impl Deref for SqlCipherConnection {
    type Target = RusqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for SqlCipherConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Prepared statement wrapper
pub struct SqlCipherStatement<'conn> {
    inner: RusqliteStatement<'conn>,
}

impl<'conn> SqlCipherStatement<'conn> {
    /// Create a new statement wrapper
    pub fn new(stmt: RusqliteStatement<'conn>) -> Self {
        Self { inner: stmt }
    }

    /// Execute the statement with parameters
    pub fn execute(&mut self, params: &[&dyn ToSql]) -> StorageResult<usize> {
        self.inner.execute(params).map_err(StorageError::from)
    }

    /// Query with the statement and collect mapped rows
    pub fn query_map<T, F>(&mut self, params: &[&dyn ToSql], mut f: F) -> StorageResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
    {
        let rows = self.inner.query_map(params, |row| f(row)).map_err(StorageError::from)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
    }
}
