//! Port interfaces for sync operations

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_domain::{
    CanonicalEntity, CanonicalFields, EntityKind, ExternalTriple, NewRelationshipEdge,
    RelationshipEdge, Result, StagedRecord, SyncKey,
};

/// Read access to the provider staging store
#[async_trait]
pub trait StagedRecordReader: Send + Sync {
    /// All staged records for the provider/customer/object modified strictly
    /// after `since` (every record when `since` is `None`)
    async fn list_changed_records(
        &self,
        provider_name: &str,
        customer_id: &str,
        external_object: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StagedRecord>>;
}

/// Canonical entity store keyed by external triple
#[async_trait]
pub trait CanonicalStore: Send + Sync {
    /// Create or replace the entity for `triple`, returning its stable
    /// internal id
    async fn upsert_entity(
        &self,
        kind: EntityKind,
        triple: &ExternalTriple,
        fields: &CanonicalFields,
        last_modified_at: DateTime<Utc>,
    ) -> Result<String>;

    /// Delete the entity for `triple`; `false` when nothing existed
    async fn delete_entity(&self, kind: EntityKind, triple: &ExternalTriple) -> Result<bool>;

    /// Map of provider-native id to internal id for the ids that exist
    async fn find_entities_by_external_ids(
        &self,
        kind: EntityKind,
        provider_name: &str,
        customer_id: &str,
        external_ids: &[String],
    ) -> Result<HashMap<String, String>>;

    async fn get_entity(&self, kind: EntityKind, triple: &ExternalTriple) -> Result<Option<CanonicalEntity>>;
}

/// Per-key high-water marks
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get_watermark(&self, key: &SyncKey) -> Result<Option<DateTime<Utc>>>;

    /// Store `max(current, candidate)` atomically and return the stored value
    async fn advance_watermark(&self, key: &SyncKey, candidate: DateTime<Utc>) -> Result<DateTime<Utc>>;
}

/// Opportunity-to-contact edges
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Insert unless an edge with the same natural key exists; `true` when a
    /// row was created
    async fn insert_edge_if_absent(&self, edge: &NewRelationshipEdge) -> Result<bool>;

    /// Edges with at least one unresolved internal id
    async fn list_pending_edges(&self, provider_name: &str, customer_id: &str) -> Result<Vec<RelationshipEdge>>;

    /// Overwrite the internal ids of one edge; `false` when the edge no
    /// longer exists
    async fn set_resolved_ids(
        &self,
        edge_id: &str,
        opportunity_id: Option<&str>,
        contact_id: Option<&str>,
    ) -> Result<bool>;

    /// Delete every edge whose `kind` endpoint has provider-native id
    /// `original_id`, returning the number removed
    async fn delete_edges_for_endpoint(
        &self,
        provider_name: &str,
        customer_id: &str,
        kind: EntityKind,
        original_id: &str,
    ) -> Result<usize>;

    async fn delete_edge(&self, edge_id: &str) -> Result<bool>;

    async fn list_edges(&self, provider_name: &str, customer_id: &str) -> Result<Vec<RelationshipEdge>>;
}
