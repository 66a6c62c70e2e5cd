//! Configuration management
//!
//! Runtime settings plus the static, per-customer mapping declarations. All
//! of it is loaded once at startup and treated as immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;
use crate::types::EntityKind;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub customers: Vec<CustomerMappingConfig>,
    /// Extra or overriding staging table registrations
    #[serde(default)]
    pub staging: Vec<StagingTableConfig>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default, skip_serializing)]
    pub encryption_key: Option<String>,
}

fn default_pool_size() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "crmsync.db".to_string(), pool_size: default_pool_size(), encryption_key: None }
    }
}

/// Trigger worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Runs allowed in flight across all keys
    pub max_concurrent_runs: usize,
    /// Upper bound on a single run, in seconds
    pub run_timeout_secs: u64,
    /// Buffered trigger events before `submit` waits
    pub queue_capacity: usize,
    /// How long `stop` waits for the worker loop to drain
    pub join_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { max_concurrent_runs: 4, run_timeout_secs: 300, queue_capacity: 256, join_timeout_secs: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

/// One customer's provider and entity mappings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerMappingConfig {
    pub customer_id: String,
    pub provider_name: String,
    /// Scanned in declaration order; the first mapping naming an external
    /// object wins
    #[serde(default)]
    pub mappings: Vec<EntityMappingConfig>,
}

/// Binding of one canonical entity to a provider object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum EntityMappingConfig {
    Contact(ContactMappingConfig),
    Opportunity(OpportunityMappingConfig),
}

impl EntityMappingConfig {
    pub fn external_object(&self) -> &str {
        match self {
            Self::Contact(config) => &config.object,
            Self::Opportunity(config) => &config.object,
        }
    }

    /// Canonical entity this mapping produces
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::Contact(_) => EntityKind::Contact,
            Self::Opportunity(_) => EntityKind::Opportunity,
        }
    }
}

/// Raw field names feeding a canonical contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactMappingConfig {
    pub object: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Raw fields that must be present and non-null
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// Raw field names feeding a canonical opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityMappingConfig {
    pub object: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub probability: Option<ProbabilityFieldConfig>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub required_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbabilityFieldConfig {
    pub field: String,
    pub encoding: ProbabilityEncoding,
}

/// How a provider field encodes win probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityEncoding {
    /// Float already in `[0, 1]`, e.g. `"0.75"`
    Fraction,
    /// Float percentage, e.g. `"65.5"`
    Percentage,
    /// Integer picklist value in percent, e.g. `"40"`
    PercentPicklist,
}

impl_domain_enum_conversions!(ProbabilityEncoding {
    Fraction => "fraction",
    Percentage => "percentage",
    PercentPicklist => "percent_picklist",
});

/// Registration of a staging table for a provider object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingTableConfig {
    pub provider_name: String,
    pub object: String,
    pub table: String,
}
