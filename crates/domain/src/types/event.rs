//! Trigger events published by the ingestion provider
//!
//! One event is published per completed ingestion batch. Only object-level,
//! standard-object, successful events lead to a sync run; everything else is
//! skipped with a [`SkipReason`](super::sync::SkipReason).

use serde::{Deserialize, Serialize};

use crate::constants::SYNC_COMPLETED_EVENT;
use crate::impl_domain_enum_conversions;

/// Upstream ingestion result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncResultStatus {
    Success,
    Error,
}

/// Whether the ingested object was a provider standard object or a
/// provider-agnostic "common" model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Common,
    Standard,
}

impl_domain_enum_conversions!(ObjectType {
    Common => "common",
    Standard => "standard",
});

fn default_webhook_event_type() -> String {
    SYNC_COMPLETED_EVENT.to_string()
}

/// Fields shared by every sync-complete event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseSyncComplete {
    #[serde(default = "default_webhook_event_type")]
    pub webhook_event_type: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub connection_id: String,
    pub customer_id: String,
    pub provider_name: String,
    pub result: SyncResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_records_synced: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl BaseSyncComplete {
    pub fn new(
        provider_name: impl Into<String>,
        customer_id: impl Into<String>,
        result: SyncResultStatus,
    ) -> Self {
        Self {
            webhook_event_type: default_webhook_event_type(),
            run_id: String::new(),
            connection_id: String::new(),
            customer_id: customer_id.into(),
            provider_name: provider_name.into(),
            result,
            num_records_synced: None,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSyncComplete {
    #[serde(flatten)]
    pub base: BaseSyncComplete,
    pub object_type: ObjectType,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySyncComplete {
    #[serde(flatten)]
    pub base: BaseSyncComplete,
    pub entity_id: String,
    pub entity_name: String,
}

/// A sync-complete notification, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncCompleteEvent {
    Object(ObjectSyncComplete),
    Entity(EntitySyncComplete),
}

impl SyncCompleteEvent {
    /// Object-level event
    pub fn object(
        provider_name: impl Into<String>,
        customer_id: impl Into<String>,
        object_type: ObjectType,
        object: impl Into<String>,
        result: SyncResultStatus,
    ) -> Self {
        Self::Object(ObjectSyncComplete {
            base: BaseSyncComplete::new(provider_name, customer_id, result),
            object_type,
            object: object.into(),
        })
    }

    /// Successful standard-object event, the only shape that triggers a run
    pub fn standard_success(
        provider_name: impl Into<String>,
        customer_id: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self::object(provider_name, customer_id, ObjectType::Standard, object, SyncResultStatus::Success)
    }

    pub const fn base(&self) -> &BaseSyncComplete {
        match self {
            Self::Object(event) => &event.base,
            Self::Entity(event) => &event.base,
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.base().provider_name
    }

    pub fn customer_id(&self) -> &str {
        &self.base().customer_id
    }

    /// External object name, for object-level events
    pub fn object_name(&self) -> Option<&str> {
        match self {
            Self::Object(event) => Some(&event.object),
            Self::Entity(_) => None,
        }
    }
}
