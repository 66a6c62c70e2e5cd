//! Opportunity-to-contact relationship repository

use std::sync::Arc;

use async_trait::async_trait;
use crmsync_common::storage::error::StorageResult;
use crmsync_common::storage::sqlcipher::SqlCipherConnection;
use crmsync_core::sync::ports::RelationshipStore;
use crmsync_domain::{
    new_internal_id, EntityKind, NewRelationshipEdge, RelationshipEdge,
    Result as DomainResult,
};
use rusqlite::{params, Row};
use tokio::task;

use super::columns::{from_millis, now_millis, to_millis};
use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

const EDGE_COLUMNS: &str = "id, provider_name, customer_id, original_opportunity_id, original_contact_id,
     opportunity_id, contact_id, last_modified_at";

/// SQLite-backed [`RelationshipStore`]
pub struct SqliteRelationshipRepository {
    db: Arc<DbManager>,
}

impl SqliteRelationshipRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RelationshipStore for SqliteRelationshipRepository {
    async fn insert_edge_if_absent(&self, edge: &NewRelationshipEdge) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let edge = edge.clone();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            insert_edge(&conn, &edge).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_pending_edges(
        &self,
        provider_name: &str,
        customer_id: &str,
    ) -> DomainResult<Vec<RelationshipEdge>> {
        let db = Arc::clone(&self.db);
        let provider_name = provider_name.to_string();
        let customer_id = customer_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<RelationshipEdge>> {
            let conn = db.get_connection()?;
            query_edges(&conn, &provider_name, &customer_id, true).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_resolved_ids(
        &self,
        edge_id: &str,
        opportunity_id: Option<&str>,
        contact_id: Option<&str>,
    ) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let edge_id = edge_id.to_string();
        let opportunity_id = opportunity_id.map(str::to_string);
        let contact_id = contact_id.map(str::to_string);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let updated = update_resolved_ids(&conn, &edge_id, opportunity_id.as_deref(), contact_id.as_deref())
                .map_err(map_storage_error)?;
            Ok(updated > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_edges_for_endpoint(
        &self,
        provider_name: &str,
        customer_id: &str,
        kind: EntityKind,
        original_id: &str,
    ) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);
        let provider_name = provider_name.to_string();
        let customer_id = customer_id.to_string();
        let original_id = original_id.to_string();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            delete_for_endpoint(&conn, &provider_name, &customer_id, kind, &original_id)
                .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_edge(&self, edge_id: &str) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let edge_id = edge_id.to_string();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let removed = conn
                .execute("DELETE FROM relationship_opportunity_contact WHERE id = ?1", params![&edge_id])
                .map_err(map_storage_error)?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_edges(&self, provider_name: &str, customer_id: &str) -> DomainResult<Vec<RelationshipEdge>> {
        let db = Arc::clone(&self.db);
        let provider_name = provider_name.to_string();
        let customer_id = customer_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<RelationshipEdge>> {
            let conn = db.get_connection()?;
            query_edges(&conn, &provider_name, &customer_id, false).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn insert_edge(conn: &SqlCipherConnection, edge: &NewRelationshipEdge) -> StorageResult<bool> {
    let now = now_millis();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO relationship_opportunity_contact
             (id, provider_name, customer_id, original_opportunity_id, original_contact_id,
              opportunity_id, contact_id, last_modified_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, ?7, ?7)",
        params![
            new_internal_id(),
            &edge.provider_name,
            &edge.customer_id,
            &edge.original_opportunity_id,
            &edge.original_contact_id,
            to_millis(edge.last_modified_at),
            now,
        ],
    )?;
    Ok(inserted > 0)
}

fn query_edges(
    conn: &SqlCipherConnection,
    provider_name: &str,
    customer_id: &str,
    pending_only: bool,
) -> StorageResult<Vec<RelationshipEdge>> {
    let pending = if pending_only { " AND (opportunity_id IS NULL OR contact_id IS NULL)" } else { "" };
    let sql = format!(
        "SELECT {EDGE_COLUMNS} FROM relationship_opportunity_contact
         WHERE provider_name = ?1 AND customer_id = ?2{pending}
         ORDER BY original_opportunity_id, original_contact_id"
    );

    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(params![provider_name, customer_id], map_edge_row)
}

fn update_resolved_ids(
    conn: &SqlCipherConnection,
    edge_id: &str,
    opportunity_id: Option<&str>,
    contact_id: Option<&str>,
) -> StorageResult<usize> {
    conn.execute(
        "UPDATE relationship_opportunity_contact
         SET opportunity_id = ?2, contact_id = ?3, updated_at = ?4
         WHERE id = ?1",
        params![edge_id, opportunity_id, contact_id, now_millis()],
    )
}

fn delete_for_endpoint(
    conn: &SqlCipherConnection,
    provider_name: &str,
    customer_id: &str,
    kind: EntityKind,
    original_id: &str,
) -> StorageResult<usize> {
    let column = match kind {
        EntityKind::Contact => "original_contact_id",
        EntityKind::Opportunity => "original_opportunity_id",
    };
    let sql = format!(
        "DELETE FROM relationship_opportunity_contact
         WHERE provider_name = ?1 AND customer_id = ?2 AND {column} = ?3"
    );
    conn.execute(&sql, params![provider_name, customer_id, original_id])
}

fn map_edge_row(row: &Row<'_>) -> rusqlite::Result<RelationshipEdge> {
    Ok(RelationshipEdge {
        id: row.get(0)?,
        provider_name: row.get(1)?,
        customer_id: row.get(2)?,
        original_opportunity_id: row.get(3)?,
        original_contact_id: row.get(4)?,
        opportunity_id: row.get(5)?,
        contact_id: row.get(6)?,
        last_modified_at: from_millis(7, row.get(7)?)?,
    })
}
