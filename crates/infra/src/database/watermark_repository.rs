//! Sync watermark repository
//!
//! `advance_watermark` merges with `MAX` inside a single upsert, so two
//! overlapping runs on one key can never move the stored value backwards.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_common::storage::error::{StorageError, StorageResult};
use crmsync_common::storage::sqlcipher::SqlCipherConnection;
use crmsync_core::sync::ports::WatermarkStore;
use crmsync_domain::{EntityKind, Result as DomainResult, SyncKey, SyncWatermark};
use rusqlite::params;
use rusqlite::types::Type;
use tokio::task;

use super::columns::{from_millis, now_millis, to_millis};
use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

/// SQLite-backed [`WatermarkStore`]
pub struct SqliteWatermarkRepository {
    db: Arc<DbManager>,
}

impl SqliteWatermarkRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// All stored watermarks, ordered by key
    pub async fn list_watermarks(&self) -> DomainResult<Vec<SyncWatermark>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<SyncWatermark>> {
            let conn = db.get_connection()?;
            query_all(&conn).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl WatermarkStore for SqliteWatermarkRepository {
    async fn get_watermark(&self, key: &SyncKey) -> DomainResult<Option<DateTime<Utc>>> {
        let db = Arc::clone(&self.db);
        let key = key.clone();

        task::spawn_blocking(move || -> DomainResult<Option<DateTime<Utc>>> {
            let conn = db.get_connection()?;
            query_watermark(&conn, &key).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn advance_watermark(
        &self,
        key: &SyncKey,
        candidate: DateTime<Utc>,
    ) -> DomainResult<DateTime<Utc>> {
        let db = Arc::clone(&self.db);
        let key = key.clone();

        task::spawn_blocking(move || -> DomainResult<DateTime<Utc>> {
            let conn = db.get_connection()?;
            merge_watermark(&conn, &key, to_millis(candidate)).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn query_watermark(conn: &SqlCipherConnection, key: &SyncKey) -> StorageResult<Option<DateTime<Utc>>> {
    let sql = "SELECT max_last_modified_at FROM sync_watermark
               WHERE provider_name = ?1 AND customer_id = ?2 AND canonical_object = ?3";

    match conn.query_row(
        sql,
        params![&key.provider_name, &key.customer_id, key.canonical_object.as_str()],
        |row| from_millis(0, row.get(0)?),
    ) {
        Ok(at) => Ok(Some(at)),
        Err(StorageError::Rusqlite(rusqlite::Error::QueryReturnedNoRows)) => Ok(None),
        Err(err) => Err(err),
    }
}

fn merge_watermark(conn: &SqlCipherConnection, key: &SyncKey, candidate: i64) -> StorageResult<DateTime<Utc>> {
    conn.query_row(
        "INSERT INTO sync_watermark
             (provider_name, customer_id, canonical_object, max_last_modified_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(provider_name, customer_id, canonical_object) DO UPDATE SET
             max_last_modified_at = MAX(sync_watermark.max_last_modified_at, excluded.max_last_modified_at),
             updated_at = excluded.updated_at
         RETURNING max_last_modified_at",
        params![
            &key.provider_name,
            &key.customer_id,
            key.canonical_object.as_str(),
            candidate,
            now_millis(),
        ],
        |row| from_millis(0, row.get(0)?),
    )
}

fn query_all(conn: &SqlCipherConnection) -> StorageResult<Vec<SyncWatermark>> {
    let mut stmt = conn.prepare(
        "SELECT provider_name, customer_id, canonical_object, max_last_modified_at
         FROM sync_watermark
         ORDER BY provider_name, customer_id, canonical_object",
    )?;

    stmt.query_map(params![], |row| {
        let object: String = row.get(2)?;
        let canonical_object = object.parse::<EntityKind>().map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "canonical_object".into(), Type::Text)
        })?;
        Ok(SyncWatermark {
            key: SyncKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?, canonical_object),
            max_last_modified_at: from_millis(3, row.get(3)?)?,
        })
    })
}
