//! Mapper registry
//!
//! Resolves `(provider, customer, external object)` to the canonical entity
//! kind and transform configured for that customer. Built once from static
//! configuration; lookups are pure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crmsync_domain::{CrmSyncError, CustomerMappingConfig, EntityKind, EntityMappingConfig, Result};
use tracing::debug;

use super::transform::{ContactTransform, EntityTransform, OpportunityTransform};

/// Binding of one external object to a canonical entity and its transform
#[derive(Debug, Clone)]
pub struct Mapper {
    pub external_object: String,
    pub entity_kind: EntityKind,
    pub transform: Arc<dyn EntityTransform>,
}

impl Mapper {
    pub fn from_config(config: &EntityMappingConfig) -> Self {
        let transform: Arc<dyn EntityTransform> = match config {
            EntityMappingConfig::Contact(contact) => Arc::new(ContactTransform::from_config(contact)),
            EntityMappingConfig::Opportunity(opportunity) => {
                Arc::new(OpportunityTransform::from_config(opportunity))
            }
        };
        Self {
            external_object: config.external_object().to_string(),
            entity_kind: transform.entity_kind(),
            transform,
        }
    }
}

#[derive(Debug, Clone)]
struct CustomerMappers {
    provider_name: String,
    mappers: Vec<Mapper>,
}

/// Customer mapping lookup
#[derive(Debug, Clone, Default)]
pub struct MapperRegistry {
    customers: HashMap<String, CustomerMappers>,
    order: Vec<String>,
}

impl MapperRegistry {
    /// Build the registry from customer mapping declarations
    ///
    /// # Errors
    /// Returns `CrmSyncError::Config` for blank identifiers, duplicate
    /// customers, or a customer declaring the same external object or the
    /// same canonical entity twice. The watermark is kept per canonical
    /// entity, so two objects feeding one entity would share it.
    pub fn from_configs(configs: &[CustomerMappingConfig]) -> Result<Self> {
        let mut registry = Self::default();

        for config in configs {
            validate_customer(config)?;
            if registry.customers.contains_key(&config.customer_id) {
                return Err(CrmSyncError::Config(format!(
                    "Duplicate mapping configuration for customer '{}'",
                    config.customer_id
                )));
            }

            let mappers = config.mappings.iter().map(Mapper::from_config).collect();
            registry.order.push(config.customer_id.clone());
            registry.customers.insert(
                config.customer_id.clone(),
                CustomerMappers { provider_name: config.provider_name.clone(), mappers },
            );
        }

        Ok(registry)
    }

    /// Resolve a mapper, or `None` when the customer is unknown, declared for
    /// a different provider, or has no mapping for `external_object`
    ///
    /// Mappings are scanned in declaration order and the first whose external
    /// object matches wins.
    pub fn resolve(&self, provider_name: &str, customer_id: &str, external_object: &str) -> Option<Mapper> {
        let Some(customer) = self.customers.get(customer_id) else {
            debug!(customer_id, "No mapping configuration for customer");
            return None;
        };

        if customer.provider_name != provider_name {
            debug!(
                customer_id,
                configured = %customer.provider_name,
                requested = provider_name,
                "Provider does not match customer configuration"
            );
            return None;
        }

        customer.mappers.iter().find(|mapper| mapper.external_object == external_object).cloned()
    }

    /// Configured customer ids, in declaration order
    pub fn customer_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// All mappers declared for a customer
    pub fn mappers_for(&self, customer_id: &str) -> &[Mapper] {
        self.customers.get(customer_id).map(|customer| customer.mappers.as_slice()).unwrap_or_default()
    }

    /// Provider a customer is configured for
    pub fn provider_for(&self, customer_id: &str) -> Option<&str> {
        self.customers.get(customer_id).map(|customer| customer.provider_name.as_str())
    }

    /// `true` when no customer is configured
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

fn validate_customer(config: &CustomerMappingConfig) -> Result<()> {
    if config.customer_id.trim().is_empty() {
        return Err(CrmSyncError::Config("Customer id must not be empty".to_string()));
    }
    if config.provider_name.trim().is_empty() {
        return Err(CrmSyncError::Config(format!(
            "Provider name must not be empty for customer '{}'",
            config.customer_id
        )));
    }

    let mut seen = HashSet::new();
    let mut kinds = HashSet::new();
    for mapping in &config.mappings {
        let object = mapping.external_object();
        if object.trim().is_empty() {
            return Err(CrmSyncError::Config(format!(
                "Empty external object name in mappings for customer '{}'",
                config.customer_id
            )));
        }
        if !seen.insert(object) {
            return Err(CrmSyncError::Config(format!(
                "Customer '{}' maps external object '{object}' more than once",
                config.customer_id
            )));
        }
        let kind = mapping.entity_kind();
        if !kinds.insert(kind) {
            return Err(CrmSyncError::Config(format!(
                "Customer '{}' maps more than one external object to {kind}; object '{object}' is a second mapping",
                config.customer_id
            )));
        }
        if let EntityMappingConfig::Opportunity(opportunity) = mapping {
            if opportunity.probability.as_ref().is_some_and(|p| p.field.trim().is_empty()) {
                return Err(CrmSyncError::Config(format!(
                    "Empty probability field for customer '{}', object '{object}'",
                    config.customer_id
                )));
            }
        }
    }

    Ok(())
}
