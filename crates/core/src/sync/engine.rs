//! Incremental sync engine
//!
//! One run covers one `(provider, customer, canonical object)` key:
//!
//! 1. resolve the customer's mapper (skip when unconfigured)
//! 2. read the key's watermark
//! 3. fetch staged records modified strictly after it
//! 4. order the batch by `(last_modified_at, is_deleted)` so later revisions
//!    win and a delete wins a timestamp tie
//! 5. transform every live record before touching any store
//! 6. apply upserts and deletes sequentially, discovering and pruning
//!    relationship edges on the way
//! 7. max-merge the watermark to the batch maximum
//!
//! Any error aborts the run before step 7, so the next run re-fetches the
//! same records. Upserts and deletes are idempotent, which makes that safe.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crmsync_domain::{
    CanonicalFields, CrmSyncError, EntityKind, ExternalTriple, NewRelationshipEdge, Result,
    SkipReason, StagedRecord, SyncCompleteEvent, SyncKey, SyncOutcome, SyncReport,
};
use tracing::{debug, info, instrument, warn};

use super::ports::{CanonicalStore, RelationshipStore, StagedRecordReader, WatermarkStore};
use super::trigger::filter_event;
use crate::mapping::{Mapper, MapperRegistry};
use crate::relationships::RelationshipResolver;

/// A staged record after the transform phase
enum PlannedWrite {
    Upsert { record: StagedRecord, fields: CanonicalFields },
    Delete { record: StagedRecord },
}

impl PlannedWrite {
    const fn record(&self) -> &StagedRecord {
        match self {
            Self::Upsert { record, .. } | Self::Delete { record } => record,
        }
    }
}

/// Sync engine
pub struct SyncEngine {
    registry: Arc<MapperRegistry>,
    staging: Arc<dyn StagedRecordReader>,
    canonical: Arc<dyn CanonicalStore>,
    watermarks: Arc<dyn WatermarkStore>,
    relationships: Arc<dyn RelationshipStore>,
    pruner: RelationshipResolver,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        registry: Arc<MapperRegistry>,
        staging: Arc<dyn StagedRecordReader>,
        canonical: Arc<dyn CanonicalStore>,
        watermarks: Arc<dyn WatermarkStore>,
        relationships: Arc<dyn RelationshipStore>,
    ) -> Self {
        let pruner = RelationshipResolver::new(Arc::clone(&canonical), Arc::clone(&relationships));
        Self { registry, staging, canonical, watermarks, relationships, pruner }
    }

    /// Mapper registry this engine resolves against
    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    /// Filter a trigger event and run the sync it asks for
    pub async fn handle_event(&self, event: &SyncCompleteEvent) -> Result<SyncOutcome> {
        match filter_event(event) {
            Ok(request) => {
                self.run_sync(&request.provider_name, &request.customer_id, &request.external_object)
                    .await
            }
            Err(reason) => {
                info!(
                    provider = %event.provider_name(),
                    customer_id = %event.customer_id(),
                    reason = %reason,
                    "Skipping sync trigger"
                );
                Ok(SyncOutcome::Skipped(reason))
            }
        }
    }

    /// Run one incremental sync
    ///
    /// # Errors
    /// Store failures and transform failures abort the run without advancing
    /// the watermark.
    #[instrument(skip_all, fields(provider = %provider_name, customer_id = %customer_id, object = %external_object))]
    pub async fn run_sync(
        &self,
        provider_name: &str,
        customer_id: &str,
        external_object: &str,
    ) -> Result<SyncOutcome> {
        let Some(mapper) = self.registry.resolve(provider_name, customer_id, external_object) else {
            warn!("No mapper configured; skipping sync");
            return Ok(SyncOutcome::Skipped(SkipReason::UnconfiguredMapping {
                provider: provider_name.to_string(),
                customer_id: customer_id.to_string(),
                object: external_object.to_string(),
            }));
        };

        let key = SyncKey::new(provider_name, customer_id, mapper.entity_kind);
        let watermark = self.watermarks.get_watermark(&key).await?;
        debug!(canonical_object = %key.canonical_object, watermark = ?watermark, "Read watermark");

        let mut records = self
            .staging
            .list_changed_records(provider_name, customer_id, external_object, watermark)
            .await?;
        if let Some(since) = watermark {
            records.retain(|record| record.last_modified_at > since);
        }

        if records.is_empty() {
            info!(canonical_object = %key.canonical_object, "No changed records");
            return Ok(SyncOutcome::Applied(SyncReport::empty(key, watermark)));
        }

        records.sort_by_key(|record| (record.last_modified_at, record.is_deleted));
        let batch_max = records.iter().map(|record| record.last_modified_at).max();

        let plan = prepare_batch(&mapper, records)?;
        let mut report = self.apply_batch(&key, &mapper, plan).await?;

        if let Some(candidate) = batch_max {
            report.new_watermark = Some(self.watermarks.advance_watermark(&key, candidate).await?);
        }

        info!(
            canonical_object = %key.canonical_object,
            updated = report.updated_count,
            upserted = report.upserted,
            deleted = report.deleted,
            edges_created = report.edges_created,
            edges_pruned = report.edges_pruned,
            "Sync run applied"
        );
        Ok(SyncOutcome::Applied(report))
    }

    async fn apply_batch(
        &self,
        key: &SyncKey,
        mapper: &Mapper,
        plan: Vec<PlannedWrite>,
    ) -> Result<SyncReport> {
        let kind = mapper.entity_kind;
        let mut report = SyncReport::empty(key.clone(), None);

        for write in plan {
            let triple = ExternalTriple::new(
                key.provider_name.as_str(),
                key.customer_id.as_str(),
                write.record().external_id.as_str(),
            );

            match write {
                PlannedWrite::Delete { record } => {
                    if self.canonical.delete_entity(kind, &triple).await? {
                        report.deleted += 1;
                    }
                    report.edges_pruned += self
                        .pruner
                        .prune_endpoint(&key.provider_name, &key.customer_id, kind, &record.external_id)
                        .await?;
                }
                PlannedWrite::Upsert { record, fields } => {
                    self.canonical.upsert_entity(kind, &triple, &fields, record.last_modified_at).await?;
                    report.upserted += 1;
                    report.edges_created += self.discover_edges(key, kind, &record).await?;
                }
            }
            report.updated_count += 1;
        }

        Ok(report)
    }

    /// Create pending edges for a live record's associations
    async fn discover_edges(&self, key: &SyncKey, kind: EntityKind, record: &StagedRecord) -> Result<usize> {
        let mut created = 0;

        for (object, related_ids) in &record.associations {
            let related_kind = self
                .registry
                .resolve(&key.provider_name, &key.customer_id, object)
                .map(|mapper| mapper.entity_kind);
            if related_kind != Some(kind.counterpart()) {
                debug!(association = %object, "Ignoring association without a counterpart mapping");
                continue;
            }

            let distinct: BTreeSet<&str> =
                related_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()).collect();
            for related_id in distinct {
                let edge = new_edge(key, kind, &record.external_id, related_id, record.last_modified_at);
                if self.relationships.insert_edge_if_absent(&edge).await? {
                    created += 1;
                }
            }
        }

        Ok(created)
    }
}

fn new_edge(
    key: &SyncKey,
    kind: EntityKind,
    source_id: &str,
    related_id: &str,
    last_modified_at: DateTime<Utc>,
) -> NewRelationshipEdge {
    NewRelationshipEdge::between(
        key.provider_name.as_str(),
        key.customer_id.as_str(),
        kind,
        source_id,
        related_id,
        last_modified_at,
    )
}

/// Transform every live record up front; the first failure fails the batch
fn prepare_batch(mapper: &Mapper, records: Vec<StagedRecord>) -> Result<Vec<PlannedWrite>> {
    records
        .into_iter()
        .map(|record| {
            if record.is_deleted {
                return Ok(PlannedWrite::Delete { record });
            }
            match mapper.transform.transform(&record.raw_fields) {
                Ok(fields) => Ok(PlannedWrite::Upsert { record, fields }),
                Err(source) => {
                    warn!(external_id = %record.external_id, error = %source, "Record transform failed");
                    Err(CrmSyncError::Transform { external_id: record.external_id, source })
                }
            }
        })
        .collect()
}
