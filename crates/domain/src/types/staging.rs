//! Records as staged by the ingestion provider

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw provider fields for one staged record
///
/// Values keep whatever JSON type the provider staged (HubSpot stages every
/// property as a string, Salesforce mixes strings, numbers and booleans).
/// Mappers read this bag through [`RawFieldBag::get`], which distinguishes a
/// key that is absent from one that is present but null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawFieldBag(BTreeMap<String, Value>);

/// Result of looking up a single raw field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawField<'a> {
    Absent,
    Null,
    Value(&'a Value),
}

impl RawField<'_> {
    /// True for both absent and null
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Absent | Self::Null)
    }
}

impl RawFieldBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from a JSON object; any other JSON value yields `None`
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map.into_iter().collect())),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> RawField<'_> {
        match self.0.get(key) {
            None => RawField::Absent,
            Some(Value::Null) => RawField::Null,
            Some(value) => RawField::Value(value),
        }
    }

    /// The field as a string slice, when it is present and a JSON string
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            RawField::Value(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawFieldBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One staged revision of a provider record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedRecord {
    /// Provider-native identifier
    pub external_id: String,
    pub raw_fields: RawFieldBag,
    /// Monotonic per record revision
    pub last_modified_at: DateTime<Utc>,
    /// Soft-delete marker
    pub is_deleted: bool,
    /// Related records, keyed by provider-native object name
    /// (e.g. `{"contact": ["c1", "c2"]}` on a HubSpot deal)
    #[serde(default)]
    pub associations: BTreeMap<String, Vec<String>>,
}

impl StagedRecord {
    /// A live revision carrying `raw_fields`
    pub fn live(
        external_id: impl Into<String>,
        last_modified_at: DateTime<Utc>,
        raw_fields: RawFieldBag,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            raw_fields,
            last_modified_at,
            is_deleted: false,
            associations: BTreeMap::new(),
        }
    }

    /// A soft-deleted revision
    pub fn deleted(external_id: impl Into<String>, last_modified_at: DateTime<Utc>) -> Self {
        Self {
            external_id: external_id.into(),
            raw_fields: RawFieldBag::new(),
            last_modified_at,
            is_deleted: true,
            associations: BTreeMap::new(),
        }
    }

    /// Attach an association list for `object`
    #[must_use]
    pub fn with_associations<I, S>(mut self, object: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associations
            .entry(object.into())
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }
}
