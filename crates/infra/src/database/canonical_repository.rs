//! Canonical entity repository
//!
//! One table per canonical kind, each keyed by the external triple with a
//! UUIDv7 primary key that survives every later upsert.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_common::storage::error::{StorageError, StorageResult};
use crmsync_common::storage::sqlcipher::SqlCipherConnection;
use crmsync_core::sync::ports::CanonicalStore;
use crmsync_domain::constants::EXTERNAL_ID_LOOKUP_CHUNK;
use crmsync_domain::{
    new_internal_id, CanonicalEntity, CanonicalFields, Contact, CrmSyncError, EntityKind,
    ExternalTriple, Opportunity, Result as DomainResult,
};
use rusqlite::types::ToSql;
use rusqlite::{params, Row};
use tokio::task;

use super::columns::{from_millis, now_millis, to_millis};
use super::manager::DbManager;
use crate::errors::{map_join_error, map_storage_error};

/// SQLite-backed [`CanonicalStore`]
pub struct SqliteCanonicalRepository {
    db: Arc<DbManager>,
}

impl SqliteCanonicalRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Every entity of `kind` for one provider/customer, ordered by
    /// provider-native id
    pub async fn list_entities(
        &self,
        kind: EntityKind,
        provider_name: &str,
        customer_id: &str,
    ) -> DomainResult<Vec<CanonicalEntity>> {
        let db = Arc::clone(&self.db);
        let provider_name = provider_name.to_string();
        let customer_id = customer_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<CanonicalEntity>> {
            let conn = db.get_connection()?;
            query_entities(&conn, kind, &provider_name, &customer_id).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl CanonicalStore for SqliteCanonicalRepository {
    async fn upsert_entity(
        &self,
        kind: EntityKind,
        triple: &ExternalTriple,
        fields: &CanonicalFields,
        last_modified_at: DateTime<Utc>,
    ) -> DomainResult<String> {
        if fields.kind() != kind {
            return Err(CrmSyncError::InvalidInput(format!(
                "cannot store {} fields as a {kind}",
                fields.kind()
            )));
        }

        let db = Arc::clone(&self.db);
        let triple = triple.clone();
        let fields = fields.clone();

        task::spawn_blocking(move || -> DomainResult<String> {
            let conn = db.get_connection()?;
            let modified = to_millis(last_modified_at);
            match &fields {
                CanonicalFields::Contact(contact) => upsert_contact(&conn, &triple, contact, modified),
                CanonicalFields::Opportunity(opportunity) => {
                    upsert_opportunity(&conn, &triple, opportunity, modified)
                }
            }
            .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_entity(&self, kind: EntityKind, triple: &ExternalTriple) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let triple = triple.clone();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            delete_by_triple(&conn, kind, &triple).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_entities_by_external_ids(
        &self,
        kind: EntityKind,
        provider_name: &str,
        customer_id: &str,
        external_ids: &[String],
    ) -> DomainResult<HashMap<String, String>> {
        if external_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let db = Arc::clone(&self.db);
        let provider_name = provider_name.to_string();
        let customer_id = customer_id.to_string();
        let external_ids = external_ids.to_vec();

        task::spawn_blocking(move || -> DomainResult<HashMap<String, String>> {
            let conn = db.get_connection()?;
            let mut found = HashMap::with_capacity(external_ids.len());
            for chunk in external_ids.chunks(EXTERNAL_ID_LOOKUP_CHUNK) {
                let rows = query_ids_chunk(&conn, kind, &provider_name, &customer_id, chunk)
                    .map_err(map_storage_error)?;
                found.extend(rows);
            }
            Ok(found)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_entity(
        &self,
        kind: EntityKind,
        triple: &ExternalTriple,
    ) -> DomainResult<Option<CanonicalEntity>> {
        let db = Arc::clone(&self.db);
        let triple = triple.clone();

        task::spawn_blocking(move || -> DomainResult<Option<CanonicalEntity>> {
            let conn = db.get_connection()?;
            query_entity(&conn, kind, &triple).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

const fn table_for(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Contact => "canonical_contact",
        EntityKind::Opportunity => "canonical_opportunity",
    }
}

fn upsert_contact(
    conn: &SqlCipherConnection,
    triple: &ExternalTriple,
    contact: &Contact,
    last_modified_at: i64,
) -> StorageResult<String> {
    let now = now_millis();
    conn.query_row(
        "INSERT INTO canonical_contact
             (id, provider_name, customer_id, original_id, first_name, last_name,
              last_modified_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
         ON CONFLICT(provider_name, customer_id, original_id) DO UPDATE SET
             first_name = excluded.first_name,
             last_name = excluded.last_name,
             last_modified_at = excluded.last_modified_at,
             updated_at = excluded.updated_at
         RETURNING id",
        params![
            new_internal_id(),
            &triple.provider_name,
            &triple.customer_id,
            &triple.original_id,
            &contact.first_name,
            &contact.last_name,
            last_modified_at,
            now,
        ],
        |row| row.get(0),
    )
}

fn upsert_opportunity(
    conn: &SqlCipherConnection,
    triple: &ExternalTriple,
    opportunity: &Opportunity,
    last_modified_at: i64,
) -> StorageResult<String> {
    let now = now_millis();
    conn.query_row(
        "INSERT INTO canonical_opportunity
             (id, provider_name, customer_id, original_id, name, description, probability,
              amount, last_modified_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
         ON CONFLICT(provider_name, customer_id, original_id) DO UPDATE SET
             name = excluded.name,
             description = excluded.description,
             probability = excluded.probability,
             amount = excluded.amount,
             last_modified_at = excluded.last_modified_at,
             updated_at = excluded.updated_at
         RETURNING id",
        params![
            new_internal_id(),
            &triple.provider_name,
            &triple.customer_id,
            &triple.original_id,
            &opportunity.name,
            &opportunity.description,
            opportunity.probability,
            opportunity.amount,
            last_modified_at,
            now,
        ],
        |row| row.get(0),
    )
}

fn delete_by_triple(
    conn: &SqlCipherConnection,
    kind: EntityKind,
    triple: &ExternalTriple,
) -> StorageResult<bool> {
    let sql = format!(
        "DELETE FROM {} WHERE provider_name = ?1 AND customer_id = ?2 AND original_id = ?3",
        table_for(kind)
    );
    let removed =
        conn.execute(&sql, params![&triple.provider_name, &triple.customer_id, &triple.original_id])?;
    Ok(removed > 0)
}

fn query_ids_chunk(
    conn: &SqlCipherConnection,
    kind: EntityKind,
    provider_name: &str,
    customer_id: &str,
    chunk: &[String],
) -> StorageResult<Vec<(String, String)>> {
    let placeholders: Vec<String> = (0..chunk.len()).map(|i| format!("?{}", i + 3)).collect();
    let sql = format!(
        "SELECT original_id, id FROM {} WHERE provider_name = ?1 AND customer_id = ?2 AND original_id IN ({})",
        table_for(kind),
        placeholders.join(", ")
    );

    let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() + 2);
    bound.push(&provider_name);
    bound.push(&customer_id);
    for id in chunk {
        bound.push(id);
    }

    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(&bound, |row| Ok((row.get(0)?, row.get(1)?)))
}

fn entity_select(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Contact => {
            "SELECT id, provider_name, customer_id, original_id, last_modified_at,
                    first_name, last_name
             FROM canonical_contact"
        }
        EntityKind::Opportunity => {
            "SELECT id, provider_name, customer_id, original_id, last_modified_at,
                    name, description, probability, amount
             FROM canonical_opportunity"
        }
    }
}

fn query_entity(
    conn: &SqlCipherConnection,
    kind: EntityKind,
    triple: &ExternalTriple,
) -> StorageResult<Option<CanonicalEntity>> {
    let sql = format!(
        "{} WHERE provider_name = ?1 AND customer_id = ?2 AND original_id = ?3",
        entity_select(kind)
    );

    match conn.query_row(
        &sql,
        params![&triple.provider_name, &triple.customer_id, &triple.original_id],
        |row| map_entity_row(kind, row),
    ) {
        Ok(entity) => Ok(Some(entity)),
        Err(StorageError::Rusqlite(rusqlite::Error::QueryReturnedNoRows)) => Ok(None),
        Err(err) => Err(err),
    }
}

fn query_entities(
    conn: &SqlCipherConnection,
    kind: EntityKind,
    provider_name: &str,
    customer_id: &str,
) -> StorageResult<Vec<CanonicalEntity>> {
    let sql = format!(
        "{} WHERE provider_name = ?1 AND customer_id = ?2 ORDER BY original_id",
        entity_select(kind)
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(params![provider_name, customer_id], |row| map_entity_row(kind, row))
}

fn map_entity_row(kind: EntityKind, row: &Row<'_>) -> rusqlite::Result<CanonicalEntity> {
    let fields = match kind {
        EntityKind::Contact => {
            CanonicalFields::Contact(Contact { first_name: row.get(5)?, last_name: row.get(6)? })
        }
        EntityKind::Opportunity => CanonicalFields::Opportunity(Opportunity {
            name: row.get(5)?,
            description: row.get(6)?,
            probability: row.get(7)?,
            amount: row.get(8)?,
        }),
    };

    Ok(CanonicalEntity {
        id: row.get(0)?,
        triple: ExternalTriple::new(
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ),
        fields,
        last_modified_at: from_millis(4, row.get(4)?)?,
    })
}
