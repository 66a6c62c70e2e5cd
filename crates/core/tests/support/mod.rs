//! Shared test helpers for `crmsync-core` integration tests.
//!
//! [`Harness`] wires the engine, resolver and service to in-memory fakes so
//! tests can stage records, run syncs and inspect every store directly.

#![allow(dead_code)]

pub mod fixtures;
pub mod repositories;

use std::sync::Arc;

use crmsync_core::{MapperRegistry, RelationshipResolver, SyncEngine, SyncService};
use crmsync_domain::{CustomerMappingConfig, StagedRecord};

use self::repositories::{
    InMemoryCanonicalStore, InMemoryRelationshipStore, InMemoryStaging, InMemoryWatermarkStore,
};

pub struct Harness {
    pub staging: Arc<InMemoryStaging>,
    pub canonical: Arc<InMemoryCanonicalStore>,
    pub watermarks: Arc<InMemoryWatermarkStore>,
    pub relationships: Arc<InMemoryRelationshipStore>,
    pub engine: Arc<SyncEngine>,
    pub resolver: Arc<RelationshipResolver>,
    pub service: SyncService,
}

impl Harness {
    pub fn new(customers: &[CustomerMappingConfig]) -> Self {
        let registry = Arc::new(MapperRegistry::from_configs(customers).unwrap());
        let staging = Arc::new(InMemoryStaging::default());
        let canonical = Arc::new(InMemoryCanonicalStore::default());
        let watermarks = Arc::new(InMemoryWatermarkStore::default());
        let relationships = Arc::new(InMemoryRelationshipStore::default());

        let engine = Arc::new(SyncEngine::new(
            registry,
            staging.clone(),
            canonical.clone(),
            watermarks.clone(),
            relationships.clone(),
        ));
        let resolver = Arc::new(RelationshipResolver::new(canonical.clone(), relationships.clone()));
        let service = SyncService::new(engine.clone(), resolver.clone());

        Self { staging, canonical, watermarks, relationships, engine, resolver, service }
    }

    /// Harness with the three reference customers
    pub fn reference() -> Self {
        Self::new(&fixtures::reference_customers())
    }

    pub fn stage(&self, provider: &str, customer: &str, object: &str, record: StagedRecord) {
        self.staging.stage(provider, customer, object, record);
    }
}
