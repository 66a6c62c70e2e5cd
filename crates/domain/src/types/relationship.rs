//! Opportunity-to-contact relationship edges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::EntityKind;

/// Link between an opportunity and a contact, keyed by provider-native ids
///
/// The internal ids are filled in by the relationship resolver once both
/// endpoints exist in the canonical store. An edge with either internal id
/// missing is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub id: String,
    pub provider_name: String,
    pub customer_id: String,
    pub original_opportunity_id: String,
    pub original_contact_id: String,
    pub opportunity_id: Option<String>,
    pub contact_id: Option<String>,
    pub last_modified_at: DateTime<Utc>,
}

impl RelationshipEdge {
    pub fn is_pending(&self) -> bool {
        self.opportunity_id.is_none() || self.contact_id.is_none()
    }

    /// Provider-native id of the endpoint of the given kind
    pub fn original_id(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Opportunity => &self.original_opportunity_id,
            EntityKind::Contact => &self.original_contact_id,
        }
    }

    /// Resolved internal id of the endpoint of the given kind, if any
    pub fn internal_id(&self, kind: EntityKind) -> Option<&str> {
        match kind {
            EntityKind::Opportunity => self.opportunity_id.as_deref(),
            EntityKind::Contact => self.contact_id.as_deref(),
        }
    }
}

/// Edge as discovered from a staged record's associations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelationshipEdge {
    pub provider_name: String,
    pub customer_id: String,
    pub original_opportunity_id: String,
    pub original_contact_id: String,
    pub last_modified_at: DateTime<Utc>,
}

impl NewRelationshipEdge {
    /// Build an edge from one endpoint and its counterpart
    ///
    /// `source_kind` is the kind of the record that carried the association;
    /// the ids are placed on the matching sides.
    pub fn between(
        provider_name: impl Into<String>,
        customer_id: impl Into<String>,
        source_kind: EntityKind,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        last_modified_at: DateTime<Utc>,
    ) -> Self {
        let (original_opportunity_id, original_contact_id) = match source_kind {
            EntityKind::Opportunity => (source_id.into(), target_id.into()),
            EntityKind::Contact => (target_id.into(), source_id.into()),
        };
        Self {
            provider_name: provider_name.into(),
            customer_id: customer_id.into(),
            original_opportunity_id,
            original_contact_id,
            last_modified_at,
        }
    }
}
