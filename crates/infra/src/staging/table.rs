//! Typed accessor over one provider staging table

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_common::storage::error::StorageResult;
use crmsync_common::storage::sqlcipher::SqlCipherConnection;
use crmsync_domain::{CrmSyncError, RawFieldBag, Result as DomainResult, StagedRecord};
use rusqlite::{params, Row};
use tokio::task;
use tracing::debug;

use crate::database::columns::{from_json, from_millis, to_millis};
use crate::database::DbManager;
use crate::errors::{map_join_error, map_sql_error, map_storage_error};

/// Read capability for one `(provider, external object)` staging source
#[async_trait]
pub trait StagedRecordSource: Send + Sync {
    /// Human-readable name of the backing source, for logs
    fn describe(&self) -> &str;

    /// Records for `provider_name`/`customer_id` modified strictly after
    /// `since`, ascending by modification time
    async fn list_changed_records(
        &self,
        provider_name: &str,
        customer_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<StagedRecord>>;
}

/// SQLite staging table with the shared staging column layout
///
/// Each row is one revision of a record: the primary key is
/// `(provider_name, customer_id, external_id, last_modified_at)`, so
/// re-writing the same revision overwrites it and newer revisions append.
pub struct SqliteStagingTable {
    db: Arc<DbManager>,
    table: String,
}

impl SqliteStagingTable {
    /// Accessor for `table`, which must be a plain SQL identifier
    pub fn new(db: Arc<DbManager>, table: impl Into<String>) -> DomainResult<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self { db, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table and its change index if they do not exist yet
    pub fn ensure_table(&self) -> DomainResult<()> {
        let conn = self.db.get_connection()?;
        conn.execute_batch(&create_table_sql(&self.table)).map_err(map_sql_error)?;
        debug!(table = %self.table, "staging table ensured");
        Ok(())
    }

    /// Write one staged revision
    pub async fn upsert_staged_record(
        &self,
        provider_name: &str,
        customer_id: &str,
        record: &StagedRecord,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let table = self.table.clone();
        let provider_name = provider_name.to_string();
        let customer_id = customer_id.to_string();
        let raw_fields = serde_json::to_string(&record.raw_fields)
            .map_err(|e| CrmSyncError::InvalidInput(format!("raw fields are not serialisable: {e}")))?;
        let associations = serde_json::to_string(&record.associations)
            .map_err(|e| CrmSyncError::InvalidInput(format!("associations are not serialisable: {e}")))?;
        let row = StagingRow {
            external_id: record.external_id.clone(),
            raw_fields,
            associations,
            last_modified_at: to_millis(record.last_modified_at),
            is_deleted: record.is_deleted,
        };

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            upsert_row(&conn, &table, &provider_name, &customer_id, &row).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl StagedRecordSource for SqliteStagingTable {
    fn describe(&self) -> &str {
        &self.table
    }

    async fn list_changed_records(
        &self,
        provider_name: &str,
        customer_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<StagedRecord>> {
        let db = Arc::clone(&self.db);
        let table = self.table.clone();
        let provider_name = provider_name.to_string();
        let customer_id = customer_id.to_string();
        let since = since.map(to_millis);

        task::spawn_blocking(move || -> DomainResult<Vec<StagedRecord>> {
            let conn = db.get_connection()?;
            query_changed(&conn, &table, &provider_name, &customer_id, since).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

/// SQL identifiers cannot be bound as parameters, so table names are
/// restricted to `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn validate_identifier(name: &str) -> DomainResult<()> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(CrmSyncError::Config(format!("invalid staging table name '{name}'")))
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

struct StagingRow {
    external_id: String,
    raw_fields: String,
    associations: String,
    last_modified_at: i64,
    is_deleted: bool,
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
             provider_name TEXT NOT NULL,
             customer_id TEXT NOT NULL,
             external_id TEXT NOT NULL,
             raw_fields TEXT NOT NULL DEFAULT '{{}}',
             associations TEXT NOT NULL DEFAULT '{{}}',
             last_modified_at INTEGER NOT NULL,
             is_deleted INTEGER NOT NULL DEFAULT 0,
             PRIMARY KEY (provider_name, customer_id, external_id, last_modified_at)
         );
         CREATE INDEX IF NOT EXISTS idx_{table}_changed
             ON {table} (provider_name, customer_id, last_modified_at);"
    )
}

fn upsert_row(
    conn: &SqlCipherConnection,
    table: &str,
    provider_name: &str,
    customer_id: &str,
    row: &StagingRow,
) -> StorageResult<()> {
    let sql = format!(
        "INSERT INTO {table}
             (provider_name, customer_id, external_id, raw_fields, associations, last_modified_at, is_deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(provider_name, customer_id, external_id, last_modified_at) DO UPDATE SET
             raw_fields = excluded.raw_fields,
             associations = excluded.associations,
             is_deleted = excluded.is_deleted"
    );
    conn.execute(
        &sql,
        params![
            provider_name,
            customer_id,
            &row.external_id,
            &row.raw_fields,
            &row.associations,
            row.last_modified_at,
            row.is_deleted,
        ],
    )?;
    Ok(())
}

fn query_changed(
    conn: &SqlCipherConnection,
    table: &str,
    provider_name: &str,
    customer_id: &str,
    since: Option<i64>,
) -> StorageResult<Vec<StagedRecord>> {
    let sql = format!(
        "SELECT external_id, raw_fields, associations, last_modified_at, is_deleted
         FROM {table}
         WHERE provider_name = ?1 AND customer_id = ?2 AND (?3 IS NULL OR last_modified_at > ?3)
         ORDER BY last_modified_at, external_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(params![provider_name, customer_id, since], map_staged_row)
}

fn map_staged_row(row: &Row<'_>) -> rusqlite::Result<StagedRecord> {
    let raw_fields: RawFieldBag = from_json(1, &row.get::<_, String>(1)?)?;
    let associations: BTreeMap<String, Vec<String>> = from_json(2, &row.get::<_, String>(2)?)?;

    Ok(StagedRecord {
        external_id: row.get(0)?,
        raw_fields,
        last_modified_at: from_millis(3, row.get(3)?)?,
        is_deleted: row.get(4)?,
        associations,
    })
}
