//! Relationship resolver
//!
//! Rewrites pending opportunity-to-contact edges from provider-native ids to
//! internal ids once both endpoints exist in the canonical store. A pass with
//! nothing new to resolve writes nothing, so repeated or overlapping passes
//! are safe.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crmsync_domain::{EntityKind, RelationshipEdge, ResolveReport, Result};
use tracing::{debug, info, instrument, warn};

use crate::sync::ports::{CanonicalStore, RelationshipStore};

/// Second-phase edge reconciliation for one provider/customer
pub struct RelationshipResolver {
    canonical: Arc<dyn CanonicalStore>,
    relationships: Arc<dyn RelationshipStore>,
}

impl RelationshipResolver {
    /// Create a resolver over the canonical and relationship stores
    pub fn new(canonical: Arc<dyn CanonicalStore>, relationships: Arc<dyn RelationshipStore>) -> Self {
        Self { canonical, relationships }
    }

    /// Resolve every pending edge for the provider/customer
    ///
    /// Edges whose endpoints are still missing stay pending. An edge whose
    /// previously resolved endpoint has disappeared is deleted.
    #[instrument(skip_all, fields(provider = %provider_name, customer_id = %customer_id))]
    pub async fn resolve_pending(&self, provider_name: &str, customer_id: &str) -> Result<ResolveReport> {
        let pending = self.relationships.list_pending_edges(provider_name, customer_id).await?;
        if pending.is_empty() {
            debug!("No pending relationship edges");
            return Ok(ResolveReport::default());
        }

        let opportunities = self
            .lookup(EntityKind::Opportunity, provider_name, customer_id, &pending)
            .await?;
        let contacts = self.lookup(EntityKind::Contact, provider_name, customer_id, &pending).await?;

        let mut report = ResolveReport::default();
        for edge in &pending {
            let opportunity_id = opportunities.get(&edge.original_opportunity_id).cloned();
            let contact_id = contacts.get(&edge.original_contact_id).cloned();

            let lost_opportunity = edge.opportunity_id.is_some() && opportunity_id.is_none();
            let lost_contact = edge.contact_id.is_some() && contact_id.is_none();
            if lost_opportunity || lost_contact {
                warn!(
                    edge_id = %edge.id,
                    original_opportunity_id = %edge.original_opportunity_id,
                    original_contact_id = %edge.original_contact_id,
                    "Resolved endpoint no longer exists; pruning edge"
                );
                if self.relationships.delete_edge(&edge.id).await? {
                    report.pruned_count += 1;
                }
                continue;
            }

            if opportunity_id == edge.opportunity_id && contact_id == edge.contact_id {
                continue;
            }

            let updated = self
                .relationships
                .set_resolved_ids(&edge.id, opportunity_id.as_deref(), contact_id.as_deref())
                .await?;
            if !updated {
                debug!(edge_id = %edge.id, "Edge removed by a concurrent prune; skipping");
                continue;
            }
            if opportunity_id.is_some() && contact_id.is_some() {
                report.resolved_count += 1;
            }
        }

        info!(
            pending = pending.len(),
            resolved = report.resolved_count,
            pruned = report.pruned_count,
            "Relationship resolution complete"
        );
        Ok(report)
    }

    /// Delete every edge naming `original_id` as its `kind` endpoint
    ///
    /// Called when a staged record for that endpoint is applied as a
    /// soft-delete; an edge never outlives either endpoint.
    #[instrument(skip_all, fields(provider = %provider_name, customer_id = %customer_id))]
    pub async fn prune_endpoint(
        &self,
        provider_name: &str,
        customer_id: &str,
        kind: EntityKind,
        original_id: &str,
    ) -> Result<usize> {
        let removed = self
            .relationships
            .delete_edges_for_endpoint(provider_name, customer_id, kind, original_id)
            .await?;
        if removed > 0 {
            debug!(kind = %kind, original_id, removed, "Pruned edges for deleted endpoint");
        }
        Ok(removed)
    }

    async fn lookup(
        &self,
        kind: EntityKind,
        provider_name: &str,
        customer_id: &str,
        edges: &[RelationshipEdge],
    ) -> Result<HashMap<String, String>> {
        let ids: Vec<String> = edges
            .iter()
            .map(|edge| edge.original_id(kind).to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        self.canonical.find_entities_by_external_ids(kind, provider_name, customer_id, &ids).await
    }
}
