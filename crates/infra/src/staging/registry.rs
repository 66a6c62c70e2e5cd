//! `(provider, external object)` → staging source dispatch
//!
//! Adding a provider object is a registration here, not a new code path in
//! the engine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_core::sync::ports::StagedRecordReader;
use crmsync_domain::{CrmSyncError, Result as DomainResult, StagedRecord, StagingTableConfig};
use tracing::{debug, info};

use super::table::{SqliteStagingTable, StagedRecordSource};
use crate::database::DbManager;

/// Built-in `(provider, object, table)` registrations
pub const DEFAULT_STAGING_TABLES: [(&str, &str, &str); 5] = [
    ("hubspot", "contact", "staging_hubspot_contact"),
    ("hubspot", "deal", "staging_hubspot_deal"),
    ("salesforce", "Contact", "staging_salesforce_contact"),
    ("salesforce", "Lead", "staging_salesforce_lead"),
    ("salesforce", "Opportunity", "staging_salesforce_opportunity"),
];

/// Registry of staging sources keyed by provider and external object name
#[derive(Default)]
pub struct StagingRegistry {
    sources: HashMap<(String, String), Arc<dyn StagedRecordSource>>,
}

impl StagingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default SQLite tables plus `overrides`; a later registration for the
    /// same pair replaces the earlier one.
    pub fn from_config(db: Arc<DbManager>, overrides: &[StagingTableConfig]) -> DomainResult<Self> {
        let defaults = DEFAULT_STAGING_TABLES.iter().map(|(provider, object, table)| StagingTableConfig {
            provider_name: (*provider).to_string(),
            object: (*object).to_string(),
            table: (*table).to_string(),
        });

        let mut registry = Self::new();
        for config in defaults.chain(overrides.iter().cloned()) {
            if config.provider_name.trim().is_empty() || config.object.trim().is_empty() {
                return Err(CrmSyncError::Config(format!(
                    "staging table '{}' needs a provider and an object",
                    config.table
                )));
            }

            let table = SqliteStagingTable::new(Arc::clone(&db), &config.table)?;
            table.ensure_table()?;
            if registry.register(&config.provider_name, &config.object, Arc::new(table)).is_some() {
                debug!(
                    provider = %config.provider_name,
                    object = %config.object,
                    table = %config.table,
                    "staging registration overridden"
                );
            }
        }

        info!(sources = registry.len(), "staging registry built");
        Ok(registry)
    }

    /// Register `source` for the pair, returning the one it replaced
    pub fn register(
        &mut self,
        provider_name: &str,
        external_object: &str,
        source: Arc<dyn StagedRecordSource>,
    ) -> Option<Arc<dyn StagedRecordSource>> {
        self.sources.insert((provider_name.to_string(), external_object.to_string()), source)
    }

    pub fn source(&self, provider_name: &str, external_object: &str) -> Option<&Arc<dyn StagedRecordSource>> {
        self.sources.get(&(provider_name.to_string(), external_object.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl StagedRecordReader for StagingRegistry {
    async fn list_changed_records(
        &self,
        provider_name: &str,
        customer_id: &str,
        external_object: &str,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<StagedRecord>> {
        let source = self.source(provider_name, external_object).ok_or_else(|| {
            CrmSyncError::Config(format!(
                "no staging source registered for provider '{provider_name}' object '{external_object}'"
            ))
        })?;

        let records = source.list_changed_records(provider_name, customer_id, since).await?;
        debug!(
            provider = provider_name,
            customer_id,
            object = external_object,
            source = source.describe(),
            records = records.len(),
            "staged records listed"
        );
        Ok(records)
    }
}
