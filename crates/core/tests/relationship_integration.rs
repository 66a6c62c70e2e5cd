//! Relationship discovery, resolution and pruning through the sync service

mod support;

use std::sync::Arc;

use async_trait::async_trait;
use crmsync_core::{CanonicalStore, RelationshipResolver, RelationshipStore};
use crmsync_domain::{
    EntityKind, ExternalTriple, NewRelationshipEdge, RelationshipEdge, Result as DomainResult, SkipReason,
    StagedRecord, SyncCompleteEvent, SyncOutcome,
};
use serde_json::json;
use support::fixtures::{deleted, live, HUBSPOT, SALESFORCE};
use support::repositories::InMemoryRelationshipStore;
use support::Harness;

/// Relationship store that prunes one contact's edges right after a pending
/// scan, the way an overlapping contact-delete run would
struct PruneAfterScan {
    inner: Arc<InMemoryRelationshipStore>,
    contact_id: &'static str,
}

#[async_trait]
impl RelationshipStore for PruneAfterScan {
    async fn insert_edge_if_absent(&self, edge: &NewRelationshipEdge) -> DomainResult<bool> {
        self.inner.insert_edge_if_absent(edge).await
    }

    async fn list_pending_edges(&self, provider_name: &str, customer_id: &str) -> DomainResult<Vec<RelationshipEdge>> {
        let pending = self.inner.list_pending_edges(provider_name, customer_id).await?;
        self.inner
            .delete_edges_for_endpoint(provider_name, customer_id, EntityKind::Contact, self.contact_id)
            .await?;
        Ok(pending)
    }

    async fn set_resolved_ids(
        &self,
        edge_id: &str,
        opportunity_id: Option<&str>,
        contact_id: Option<&str>,
    ) -> DomainResult<bool> {
        self.inner.set_resolved_ids(edge_id, opportunity_id, contact_id).await
    }

    async fn delete_edges_for_endpoint(
        &self,
        provider_name: &str,
        customer_id: &str,
        kind: EntityKind,
        original_id: &str,
    ) -> DomainResult<usize> {
        self.inner.delete_edges_for_endpoint(provider_name, customer_id, kind, original_id).await
    }

    async fn delete_edge(&self, edge_id: &str) -> DomainResult<bool> {
        self.inner.delete_edge(edge_id).await
    }

    async fn list_edges(&self, provider_name: &str, customer_id: &str) -> DomainResult<Vec<RelationshipEdge>> {
        self.inner.list_edges(provider_name, customer_id).await
    }
}

fn deal_with_contacts(id: &str, at_ms: i64, contacts: &[&str]) -> StagedRecord {
    live(id, at_ms, &[("dealname", json!(id))]).with_associations("contact", contacts.iter().copied())
}

#[tokio::test(flavor = "multi_thread")]
async fn edge_stays_pending_until_contact_arrives() {
    let harness = Harness::reference();
    harness.stage(HUBSPOT, "user1", "deal", deal_with_contacts("d1", 1_000, &["c1"]));

    let first = harness
        .service
        .handle_event(&SyncCompleteEvent::standard_success(HUBSPOT, "user1", "deal"))
        .await
        .expect("deal sync");

    assert_eq!(first.sync.report().map(|r| r.edges_created), Some(1));
    let edges = harness.relationships.all();
    assert_eq!(edges.len(), 1);
    assert!(edges[0].is_pending());
    assert!(edges[0].opportunity_id.is_some(), "opportunity side resolves immediately");
    assert!(edges[0].contact_id.is_none());
    assert_eq!(first.resolve.map(|r| r.resolved_count), Some(0));

    harness.stage(HUBSPOT, "user1", "contact", live("c1", 2_000, &[("firstname", json!("Ada"))]));
    let second = harness
        .service
        .handle_event(&SyncCompleteEvent::standard_success(HUBSPOT, "user1", "contact"))
        .await
        .expect("contact sync");

    assert_eq!(second.resolve.map(|r| r.resolved_count), Some(1));
    let edges = harness.relationships.all();
    let edge = &edges[0];
    assert!(!edge.is_pending());

    let deal = harness.canonical.get(EntityKind::Opportunity, HUBSPOT, "user1", "d1").expect("d1");
    let contact = harness.canonical.get(EntityKind::Contact, HUBSPOT, "user1", "c1").expect("c1");
    assert_eq!(edge.opportunity_id.as_deref(), Some(deal.id.as_str()));
    assert_eq!(edge.contact_id.as_deref(), Some(contact.id.as_str()));
}

#[tokio::test(flavor = "multi_thread")]
async fn soft_deleting_a_contact_prunes_its_resolved_edge() {
    let harness = Harness::reference();
    harness.stage(SALESFORCE, "user3", "Contact", live("003A", 1_000, &[("LastName", json!("Hopper"))]));
    harness.stage(
        SALESFORCE,
        "user3",
        "Opportunity",
        live("006A", 1_000, &[("Name", json!("Navy"))]).with_associations("Contact", ["003A"]),
    );
    harness.service.run_sync(SALESFORCE, "user3", "Contact").await.expect("contacts");
    harness.service.run_sync(SALESFORCE, "user3", "Opportunity").await.expect("opportunities");
    assert!(!harness.relationships.all()[0].is_pending());

    harness.stage(SALESFORCE, "user3", "Contact", deleted("003A", 5_000));
    let outcome = harness.service.run_sync(SALESFORCE, "user3", "Contact").await.expect("delete");

    assert_eq!(outcome.sync.report().map(|r| r.edges_pruned), Some(1));
    assert!(harness.relationships.all().is_empty());
    assert!(harness.canonical.get(EntityKind::Contact, SALESFORCE, "user3", "003A").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_and_blank_association_ids_collapse() {
    let harness = Harness::reference();
    harness.stage(HUBSPOT, "user1", "deal", deal_with_contacts("d1", 1_000, &["c1", "c1", " ", "c2", ""]));

    let outcome = harness.service.run_sync(HUBSPOT, "user1", "deal").await.expect("sync");

    assert_eq!(outcome.sync.report().map(|r| r.edges_created), Some(2));
    let mut contacts: Vec<String> =
        harness.relationships.all().into_iter().map(|edge| edge.original_contact_id).collect();
    contacts.sort();
    assert_eq!(contacts, vec!["c1".to_string(), "c2".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn re_applying_a_record_does_not_duplicate_edges() {
    let harness = Harness::reference();
    harness.stage(HUBSPOT, "user1", "deal", deal_with_contacts("d1", 1_000, &["c1"]));
    harness.service.run_sync(HUBSPOT, "user1", "deal").await.expect("first");

    harness.stage(HUBSPOT, "user1", "deal", deal_with_contacts("d1", 2_000, &["c1"]));
    let outcome = harness.service.run_sync(HUBSPOT, "user1", "deal").await.expect("second");

    assert_eq!(outcome.sync.report().map(|r| r.edges_created), Some(0));
    assert_eq!(harness.relationships.all().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn contact_side_associations_create_the_same_edge() {
    let harness = Harness::reference();
    harness.stage(
        SALESFORCE,
        "user2",
        "Lead",
        live("00QA", 1_000, &[("FirstName", json!("Lin"))]).with_associations("Opportunity", ["006A"]),
    );
    harness.stage(
        SALESFORCE,
        "user2",
        "Opportunity",
        live("006A", 1_000, &[("Name", json!("Pilot"))]).with_associations("Lead", ["00QA"]),
    );

    harness.service.run_sync(SALESFORCE, "user2", "Lead").await.expect("leads");
    let outcome = harness.service.run_sync(SALESFORCE, "user2", "Opportunity").await.expect("opportunities");

    let edges = harness.relationships.all();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].original_opportunity_id, "006A");
    assert_eq!(edges[0].original_contact_id, "00QA");
    assert!(!edges[0].is_pending());
    assert_eq!(outcome.resolve.map(|r| r.resolved_count), Some(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn associations_to_unmapped_objects_are_ignored() {
    let harness = Harness::reference();
    harness.stage(
        HUBSPOT,
        "user1",
        "deal",
        live("d1", 1_000, &[("dealname", json!("x"))])
            .with_associations("company", ["co1"])
            .with_associations("deal", ["d2"]),
    );

    let outcome = harness.service.run_sync(HUBSPOT, "user1", "deal").await.expect("sync");

    assert_eq!(outcome.sync.report().map(|r| r.edges_created), Some(0));
    assert!(harness.relationships.all().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn resolver_is_idempotent() {
    let harness = Harness::reference();
    harness.stage(HUBSPOT, "user1", "contact", live("c1", 1_000, &[("firstname", json!("Ada"))]));
    harness.stage(HUBSPOT, "user1", "deal", deal_with_contacts("d1", 1_000, &["c1", "c2"]));
    harness.service.run_sync(HUBSPOT, "user1", "contact").await.expect("contacts");
    harness.service.run_sync(HUBSPOT, "user1", "deal").await.expect("deals");

    let writes = harness.relationships.write_count();
    let edges = harness.relationships.all();

    let again = harness.resolver.resolve_pending(HUBSPOT, "user1").await.expect("resolve");

    assert_eq!(again.resolved_count, 0);
    assert_eq!(again.pruned_count, 0);
    assert_eq!(harness.relationships.write_count(), writes);
    assert_eq!(harness.relationships.all(), edges);
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_edge_with_vanished_endpoint_is_pruned() {
    let harness = Harness::reference();
    harness.stage(HUBSPOT, "user1", "deal", deal_with_contacts("d1", 1_000, &["c1"]));
    harness.service.run_sync(HUBSPOT, "user1", "deal").await.expect("deal");

    // Simulate an edge left pointing at an opportunity that was removed
    // without going through the engine's edge pruning.
    let edge = harness.relationships.all().remove(0);
    harness.relationships.force_resolved(&edge.id, Some("stale-id"), None);
    let triple = ExternalTriple::new(HUBSPOT, "user1", "d1");
    harness.canonical.delete_entity(EntityKind::Opportunity, &triple).await.expect("delete");

    let report = harness.resolver.resolve_pending(HUBSPOT, "user1").await.expect("resolve");

    assert_eq!(report.pruned_count, 1);
    assert!(harness.relationships.all().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn skipped_trigger_never_touches_relationships() {
    let harness = Harness::reference();

    let outcome = harness
        .service
        .handle_event(&SyncCompleteEvent::standard_success(HUBSPOT, "nobody", "deal"))
        .await
        .expect("skip");

    assert!(matches!(outcome.sync, SyncOutcome::Skipped(SkipReason::UnconfiguredMapping { .. })));
    assert!(outcome.resolve.is_none());
    assert_eq!(harness.relationships.write_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_run_still_resolves_edges_from_other_keys() {
    let harness = Harness::reference();
    harness.stage(HUBSPOT, "user1", "deal", deal_with_contacts("d1", 1_000, &["c1"]));
    harness.service.run_sync(HUBSPOT, "user1", "deal").await.expect("deal");

    // The contact lands through the engine alone, without a resolver pass.
    harness.stage(HUBSPOT, "user1", "contact", live("c1", 1_000, &[("firstname", json!("Ada"))]));
    harness.engine.run_sync(HUBSPOT, "user1", "contact").await.expect("contact");
    assert!(harness.relationships.all()[0].is_pending());

    let outcome = harness.service.run_sync(HUBSPOT, "user1", "deal").await.expect("empty deal run");

    assert_eq!(outcome.sync.updated_count(), 0);
    assert_eq!(outcome.resolve.map(|r| r.resolved_count), Some(1));
    assert!(!harness.relationships.all()[0].is_pending());
}

#[tokio::test(flavor = "multi_thread")]
async fn edge_pruned_during_a_resolver_pass_is_skipped() {
    let harness = Harness::reference();
    harness.stage(HUBSPOT, "user1", "deal", deal_with_contacts("d1", 1_000, &["c1"]));
    harness.service.run_sync(HUBSPOT, "user1", "deal").await.expect("deal");
    harness.stage(HUBSPOT, "user1", "contact", live("c1", 1_000, &[("firstname", json!("Ada"))]));
    harness.engine.run_sync(HUBSPOT, "user1", "contact").await.expect("contact");
    assert!(harness.relationships.all()[0].is_pending());

    let racing = Arc::new(PruneAfterScan { inner: harness.relationships.clone(), contact_id: "c1" });
    let resolver = RelationshipResolver::new(harness.canonical.clone(), racing);

    let report = resolver.resolve_pending(HUBSPOT, "user1").await.expect("overlapping prune is not an error");

    assert_eq!(report.resolved_count, 0);
    assert_eq!(report.pruned_count, 0);
    assert!(harness.relationships.all().is_empty());
}
