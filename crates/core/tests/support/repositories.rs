//! In-memory implementations of the sync ports
//!
//! Each fake keeps its state behind a `parking_lot::Mutex` and counts the
//! writes it accepts, so tests can assert on "no mutations" as well as on
//! final state.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_core::sync::ports::{CanonicalStore, RelationshipStore, StagedRecordReader, WatermarkStore};
use crmsync_domain::{
    new_internal_id, CanonicalEntity, CanonicalFields, CrmSyncError, EntityKind, ExternalTriple,
    NewRelationshipEdge, RelationshipEdge, Result as DomainResult, StagedRecord, SyncKey,
};
use parking_lot::Mutex;

/// Staged records per `(provider, customer, object)`
#[derive(Default)]
pub struct InMemoryStaging {
    records: Mutex<Vec<(String, String, String, StagedRecord)>>,
    reads: AtomicUsize,
    fail_reads: Mutex<bool>,
}

impl InMemoryStaging {
    pub fn stage(&self, provider: &str, customer: &str, object: &str, record: StagedRecord) {
        self.records.lock().push((provider.into(), customer.into(), object.into(), record));
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }
}

#[async_trait]
impl StagedRecordReader for InMemoryStaging {
    async fn list_changed_records(
        &self,
        provider_name: &str,
        customer_id: &str,
        external_object: &str,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<StagedRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if *self.fail_reads.lock() {
            return Err(CrmSyncError::Database("staging unavailable".into()));
        }

        Ok(self
            .records
            .lock()
            .iter()
            .filter(|(provider, customer, object, record)| {
                provider == provider_name
                    && customer == customer_id
                    && object == external_object
                    && since.map_or(true, |since| record.last_modified_at > since)
            })
            .map(|(_, _, _, record)| record.clone())
            .collect())
    }
}

/// Canonical entities keyed by `(kind, triple)`
#[derive(Default)]
pub struct InMemoryCanonicalStore {
    entities: Mutex<HashMap<(EntityKind, ExternalTriple), CanonicalEntity>>,
    writes: AtomicUsize,
    fail_on_external_id: Mutex<Option<String>>,
}

impl InMemoryCanonicalStore {
    /// Number of upsert/delete calls that were accepted
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every upsert of `external_id` fail with a database error
    pub fn fail_upserts_of(&self, external_id: Option<&str>) {
        *self.fail_on_external_id.lock() = external_id.map(str::to_string);
    }

    pub fn get(&self, kind: EntityKind, provider: &str, customer: &str, original_id: &str) -> Option<CanonicalEntity> {
        self.entities.lock().get(&(kind, ExternalTriple::new(provider, customer, original_id))).cloned()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.lock().keys().filter(|(k, _)| *k == kind).count()
    }
}

#[async_trait]
impl CanonicalStore for InMemoryCanonicalStore {
    async fn upsert_entity(
        &self,
        kind: EntityKind,
        triple: &ExternalTriple,
        fields: &CanonicalFields,
        last_modified_at: DateTime<Utc>,
    ) -> DomainResult<String> {
        if self.fail_on_external_id.lock().as_deref() == Some(triple.original_id.as_str()) {
            return Err(CrmSyncError::Database(format!("write rejected for {}", triple.original_id)));
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut entities = self.entities.lock();
        let entry = entities.entry((kind, triple.clone())).or_insert_with(|| CanonicalEntity {
            id: new_internal_id(),
            triple: triple.clone(),
            fields: fields.clone(),
            last_modified_at,
        });
        entry.fields = fields.clone();
        entry.last_modified_at = last_modified_at;
        Ok(entry.id.clone())
    }

    async fn delete_entity(&self, kind: EntityKind, triple: &ExternalTriple) -> DomainResult<bool> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(self.entities.lock().remove(&(kind, triple.clone())).is_some())
    }

    async fn find_entities_by_external_ids(
        &self,
        kind: EntityKind,
        provider_name: &str,
        customer_id: &str,
        external_ids: &[String],
    ) -> DomainResult<HashMap<String, String>> {
        let entities = self.entities.lock();
        Ok(external_ids
            .iter()
            .filter_map(|id| {
                entities
                    .get(&(kind, ExternalTriple::new(provider_name, customer_id, id.as_str())))
                    .map(|entity| (id.clone(), entity.id.clone()))
            })
            .collect())
    }

    async fn get_entity(&self, kind: EntityKind, triple: &ExternalTriple) -> DomainResult<Option<CanonicalEntity>> {
        Ok(self.entities.lock().get(&(kind, triple.clone())).cloned())
    }
}

/// Watermarks with max-merge semantics
#[derive(Default)]
pub struct InMemoryWatermarkStore {
    marks: Mutex<HashMap<SyncKey, DateTime<Utc>>>,
    history: Mutex<Vec<(SyncKey, DateTime<Utc>)>>,
}

impl InMemoryWatermarkStore {
    pub fn get(&self, key: &SyncKey) -> Option<DateTime<Utc>> {
        self.marks.lock().get(key).copied()
    }

    /// Every stored value, in write order
    pub fn history(&self, key: &SyncKey) -> Vec<DateTime<Utc>> {
        self.history.lock().iter().filter(|(k, _)| k == key).map(|(_, v)| *v).collect()
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn get_watermark(&self, key: &SyncKey) -> DomainResult<Option<DateTime<Utc>>> {
        Ok(self.get(key))
    }

    async fn advance_watermark(&self, key: &SyncKey, candidate: DateTime<Utc>) -> DomainResult<DateTime<Utc>> {
        let mut marks = self.marks.lock();
        let stored = marks.entry(key.clone()).or_insert(candidate);
        if candidate > *stored {
            *stored = candidate;
        }
        let value = *stored;
        self.history.lock().push((key.clone(), value));
        Ok(value)
    }
}

/// Relationship edges with a natural-key uniqueness check
#[derive(Default)]
pub struct InMemoryRelationshipStore {
    edges: Mutex<Vec<RelationshipEdge>>,
    writes: AtomicUsize,
}

impl InMemoryRelationshipStore {
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn all(&self) -> Vec<RelationshipEdge> {
        self.edges.lock().clone()
    }

    /// Overwrite an edge's internal ids without going through the resolver
    pub fn force_resolved(&self, edge_id: &str, opportunity_id: Option<&str>, contact_id: Option<&str>) {
        if let Some(edge) = self.edges.lock().iter_mut().find(|edge| edge.id == edge_id) {
            edge.opportunity_id = opportunity_id.map(str::to_string);
            edge.contact_id = contact_id.map(str::to_string);
        }
    }
}

#[async_trait]
impl RelationshipStore for InMemoryRelationshipStore {
    async fn insert_edge_if_absent(&self, edge: &NewRelationshipEdge) -> DomainResult<bool> {
        let mut edges = self.edges.lock();
        let exists = edges.iter().any(|existing| {
            existing.provider_name == edge.provider_name
                && existing.customer_id == edge.customer_id
                && existing.original_opportunity_id == edge.original_opportunity_id
                && existing.original_contact_id == edge.original_contact_id
        });
        if exists {
            return Ok(false);
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        edges.push(RelationshipEdge {
            id: new_internal_id(),
            provider_name: edge.provider_name.clone(),
            customer_id: edge.customer_id.clone(),
            original_opportunity_id: edge.original_opportunity_id.clone(),
            original_contact_id: edge.original_contact_id.clone(),
            opportunity_id: None,
            contact_id: None,
            last_modified_at: edge.last_modified_at,
        });
        Ok(true)
    }

    async fn list_pending_edges(&self, provider_name: &str, customer_id: &str) -> DomainResult<Vec<RelationshipEdge>> {
        Ok(self
            .edges
            .lock()
            .iter()
            .filter(|edge| edge.provider_name == provider_name && edge.customer_id == customer_id && edge.is_pending())
            .cloned()
            .collect())
    }

    async fn set_resolved_ids(
        &self,
        edge_id: &str,
        opportunity_id: Option<&str>,
        contact_id: Option<&str>,
    ) -> DomainResult<bool> {
        let mut edges = self.edges.lock();
        let Some(edge) = edges.iter_mut().find(|edge| edge.id == edge_id) else {
            return Ok(false);
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        edge.opportunity_id = opportunity_id.map(str::to_string);
        edge.contact_id = contact_id.map(str::to_string);
        Ok(true)
    }

    async fn delete_edges_for_endpoint(
        &self,
        provider_name: &str,
        customer_id: &str,
        kind: EntityKind,
        original_id: &str,
    ) -> DomainResult<usize> {
        let mut edges = self.edges.lock();
        let before = edges.len();
        edges.retain(|edge| {
            !(edge.provider_name == provider_name
                && edge.customer_id == customer_id
                && edge.original_id(kind) == original_id)
        });
        let removed = before - edges.len();
        if removed > 0 {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    async fn delete_edge(&self, edge_id: &str) -> DomainResult<bool> {
        let mut edges = self.edges.lock();
        let before = edges.len();
        edges.retain(|edge| edge.id != edge_id);
        let removed = before != edges.len();
        if removed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    async fn list_edges(&self, provider_name: &str, customer_id: &str) -> DomainResult<Vec<RelationshipEdge>> {
        Ok(self
            .edges
            .lock()
            .iter()
            .filter(|edge| edge.provider_name == provider_name && edge.customer_id == customer_id)
            .cloned()
            .collect())
    }
}
