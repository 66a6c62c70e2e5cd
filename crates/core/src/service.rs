//! Two-phase trigger handling: sync, then relationship resolution

use std::sync::Arc;

use crmsync_domain::{Result, SyncCompleteEvent, SyncOutcome, TriggerOutcome};

use crate::relationships::RelationshipResolver;
use crate::sync::SyncEngine;

/// Sync service
pub struct SyncService {
    engine: Arc<SyncEngine>,
    resolver: Arc<RelationshipResolver>,
}

impl SyncService {
    /// Create a new sync service
    pub fn new(engine: Arc<SyncEngine>, resolver: Arc<RelationshipResolver>) -> Self {
        Self { engine, resolver }
    }

    /// Underlying sync engine
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Handle one trigger event end to end
    ///
    /// The resolver runs whenever the sync was not skipped, including runs
    /// that found nothing new; pending edges may have become resolvable
    /// through another key's run.
    pub async fn handle_event(&self, event: &SyncCompleteEvent) -> Result<TriggerOutcome> {
        let sync = self.engine.handle_event(event).await?;
        self.finish(sync).await
    }

    /// Run one key directly, bypassing trigger filtering
    pub async fn run_sync(
        &self,
        provider_name: &str,
        customer_id: &str,
        external_object: &str,
    ) -> Result<TriggerOutcome> {
        let sync = self.engine.run_sync(provider_name, customer_id, external_object).await?;
        self.finish(sync).await
    }

    async fn finish(&self, sync: SyncOutcome) -> Result<TriggerOutcome> {
        let resolve = match sync.report() {
            Some(report) => Some(
                self.resolver
                    .resolve_pending(&report.key.provider_name, &report.key.customer_id)
                    .await?,
            ),
            None => None,
        };
        Ok(TriggerOutcome { sync, resolve })
    }
}
