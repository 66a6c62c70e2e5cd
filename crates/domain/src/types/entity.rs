//! Canonical (provider-agnostic) entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_domain_enum_conversions;

/// Fresh internal identifier for canonical entities and edges
///
/// UUIDv7, so ids sort by creation time.
pub fn new_internal_id() -> String {
    Uuid::now_v7().to_string()
}

/// Canonical entity kinds the sync pipeline writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Contact,
    Opportunity,
}

impl_domain_enum_conversions!(EntityKind {
    Contact => "contact",
    Opportunity => "opportunity",
});

impl EntityKind {
    /// Every kind, in a stable order
    pub const ALL: [Self; 2] = [Self::Contact, Self::Opportunity];

    /// Lowercase name used for watermark keys and storage columns
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Opportunity => "opportunity",
        }
    }

    /// The other side of the opportunity-to-contact relationship
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Contact => Self::Opportunity,
            Self::Opportunity => Self::Contact,
        }
    }
}

/// `(provider, customer, provider-native id)`: the join key between a staged
/// record and its canonical entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalTriple {
    pub provider_name: String,
    pub customer_id: String,
    pub original_id: String,
}

impl ExternalTriple {
    pub fn new(
        provider_name: impl Into<String>,
        customer_id: impl Into<String>,
        original_id: impl Into<String>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            customer_id: customer_id.into(),
            original_id: original_id.into(),
        }
    }
}

/// Canonical contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Canonical opportunity
///
/// `probability` is always within `[0.0, 1.0]` when present; mappers reject
/// anything that normalises outside that interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub name: Option<String>,
    pub description: Option<String>,
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// Output of a mapper transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum CanonicalFields {
    Contact(Contact),
    Opportunity(Opportunity),
}

impl CanonicalFields {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Contact(_) => EntityKind::Contact,
            Self::Opportunity(_) => EntityKind::Opportunity,
        }
    }

    pub const fn as_contact(&self) -> Option<&Contact> {
        match self {
            Self::Contact(contact) => Some(contact),
            Self::Opportunity(_) => None,
        }
    }

    pub const fn as_opportunity(&self) -> Option<&Opportunity> {
        match self {
            Self::Opportunity(opportunity) => Some(opportunity),
            Self::Contact(_) => None,
        }
    }
}

/// A row of the canonical store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    /// System-generated internal identifier (UUIDv7)
    pub id: String,
    pub triple: ExternalTriple,
    pub fields: CanonicalFields,
    /// `last_modified_at` of the staged revision that last wrote this row
    pub last_modified_at: DateTime<Utc>,
}

impl CanonicalEntity {
    pub const fn kind(&self) -> EntityKind {
        self.fields.kind()
    }
}
