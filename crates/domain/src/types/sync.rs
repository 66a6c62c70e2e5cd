//! Sync keys, watermarks and run outcomes

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::EntityKind;

/// `(provider, customer, canonical object)`: the unit of incremental sync
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncKey {
    pub provider_name: String,
    pub customer_id: String,
    pub canonical_object: EntityKind,
}

impl SyncKey {
    pub fn new(
        provider_name: impl Into<String>,
        customer_id: impl Into<String>,
        canonical_object: EntityKind,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            customer_id: customer_id.into(),
            canonical_object,
        }
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider_name, self.customer_id, self.canonical_object)
    }
}

/// Latest `last_modified_at` already applied for a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWatermark {
    pub key: SyncKey,
    pub max_last_modified_at: DateTime<Utc>,
}

/// Why a trigger did not lead to a sync run
///
/// Skips are outcomes, not errors: nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Event was an entity-level notification
    NotObjectSync,
    /// Event referred to a common-model object
    NotStandardObject,
    /// Upstream ingestion reported failure
    UpstreamFailed { error_message: Option<String> },
    /// No mapper for this provider/customer/object
    UnconfiguredMapping { provider: String, customer_id: String, object: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotObjectSync => f.write_str("event is not an object-level sync"),
            Self::NotStandardObject => f.write_str("event is not for a standard object"),
            Self::UpstreamFailed { error_message: Some(message) } => {
                write!(f, "upstream sync failed: {message}")
            }
            Self::UpstreamFailed { error_message: None } => f.write_str("upstream sync failed"),
            Self::UnconfiguredMapping { provider, customer_id, object } => write!(
                f,
                "no mapping configured for provider '{provider}', customer '{customer_id}', object '{object}'"
            ),
        }
    }
}

/// Counters for one applied sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub key: SyncKey,
    /// Staged records applied (upserts plus deletes)
    pub updated_count: usize,
    pub upserted: usize,
    /// Deletes that removed an existing canonical entity
    pub deleted: usize,
    pub edges_created: usize,
    pub edges_pruned: usize,
    /// Stored watermark after the run; `None` when no records were found and
    /// no watermark existed yet
    pub new_watermark: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn empty(key: SyncKey, watermark: Option<DateTime<Utc>>) -> Self {
        Self {
            key,
            updated_count: 0,
            upserted: 0,
            deleted: 0,
            edges_created: 0,
            edges_pruned: 0,
            new_watermark: watermark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Applied(SyncReport),
    Skipped(SkipReason),
}

impl SyncOutcome {
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::Skipped(_) => None,
        }
    }

    pub fn updated_count(&self) -> usize {
        self.report().map_or(0, |report| report.updated_count)
    }
}

/// Counters for one resolver pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveReport {
    /// Edges that became fully resolved in this pass
    pub resolved_count: usize,
    pub pruned_count: usize,
}

/// Result of handling one trigger event end to end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub sync: SyncOutcome,
    /// `None` when the sync was skipped
    pub resolve: Option<ResolveReport>,
}
