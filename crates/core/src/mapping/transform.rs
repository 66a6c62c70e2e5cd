//! Field transforms from raw staged fields to canonical entities
//!
//! Every transform declares the raw fields it reads and whether each one is
//! required. Optional fields that are absent or null produce `None` on the
//! canonical side; required fields that are absent or null fail the record.

use std::fmt;

use crmsync_domain::{
    CanonicalFields, Contact, ContactMappingConfig, EntityKind, Opportunity,
    OpportunityMappingConfig, RawField, RawFieldBag, TransformError,
};
use serde_json::Value;

use super::probability::ProbabilityField;

/// Whether a declared raw field may be absent or null
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPresence {
    Optional,
    Required,
}

/// One raw field a transform reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRead {
    pub field: String,
    pub presence: FieldPresence,
}

/// Pure `raw fields -> canonical fields` function bound to one entity kind
///
/// Implementations must be deterministic and must only read the fields
/// returned by [`EntityTransform::declared_fields`].
pub trait EntityTransform: Send + Sync + fmt::Debug {
    fn entity_kind(&self) -> EntityKind;

    /// Raw fields read by [`EntityTransform::transform`]
    fn declared_fields(&self) -> Vec<FieldRead>;

    /// # Errors
    /// Returns a [`TransformError`] when a required field is missing or a
    /// field cannot be interpreted.
    fn transform(&self, raw: &RawFieldBag) -> Result<CanonicalFields, TransformError>;
}

/// Contact transform configured from a [`ContactMappingConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactTransform {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub required_fields: Vec<String>,
}

impl ContactTransform {
    pub fn from_config(config: &ContactMappingConfig) -> Self {
        Self {
            first_name: config.first_name.clone(),
            last_name: config.last_name.clone(),
            required_fields: config.required_fields.clone(),
        }
    }
}

impl EntityTransform for ContactTransform {
    fn entity_kind(&self) -> EntityKind {
        EntityKind::Contact
    }

    fn declared_fields(&self) -> Vec<FieldRead> {
        declare(
            [self.first_name.as_deref(), self.last_name.as_deref()],
            &self.required_fields,
        )
    }

    fn transform(&self, raw: &RawFieldBag) -> Result<CanonicalFields, TransformError> {
        check_required(raw, &self.required_fields)?;

        Ok(CanonicalFields::Contact(Contact {
            first_name: read_optional_text(raw, self.first_name.as_deref())?,
            last_name: read_optional_text(raw, self.last_name.as_deref())?,
        }))
    }
}

/// Opportunity transform configured from an [`OpportunityMappingConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityTransform {
    pub name: Option<String>,
    pub description: Option<String>,
    pub probability: Option<ProbabilityField>,
    pub amount: Option<String>,
    pub required_fields: Vec<String>,
}

impl OpportunityTransform {
    pub fn from_config(config: &OpportunityMappingConfig) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            probability: config.probability.as_ref().map(ProbabilityField::from_config),
            amount: config.amount.clone(),
            required_fields: config.required_fields.clone(),
        }
    }
}

impl EntityTransform for OpportunityTransform {
    fn entity_kind(&self) -> EntityKind {
        EntityKind::Opportunity
    }

    fn declared_fields(&self) -> Vec<FieldRead> {
        declare(
            [
                self.name.as_deref(),
                self.description.as_deref(),
                self.probability.as_ref().map(|p| p.field.as_str()),
                self.amount.as_deref(),
            ],
            &self.required_fields,
        )
    }

    fn transform(&self, raw: &RawFieldBag) -> Result<CanonicalFields, TransformError> {
        check_required(raw, &self.required_fields)?;

        let probability = match &self.probability {
            Some(field) => field.read(raw)?,
            None => None,
        };
        let amount = match self.amount.as_deref() {
            Some(field) => read_number(raw, field)?,
            None => None,
        };

        Ok(CanonicalFields::Opportunity(Opportunity {
            name: read_optional_text(raw, self.name.as_deref())?,
            description: read_optional_text(raw, self.description.as_deref())?,
            probability,
            amount,
        }))
    }
}

fn declare<const N: usize>(mapped: [Option<&str>; N], required: &[String]) -> Vec<FieldRead> {
    let mut reads: Vec<FieldRead> = Vec::with_capacity(N + required.len());
    let mut push = |field: &str, presence: FieldPresence| {
        if let Some(existing) = reads.iter_mut().find(|read| read.field == field) {
            if presence == FieldPresence::Required {
                existing.presence = FieldPresence::Required;
            }
        } else {
            reads.push(FieldRead { field: field.to_string(), presence });
        }
    };

    for field in mapped.into_iter().flatten() {
        let presence = if required.iter().any(|r| r == field) {
            FieldPresence::Required
        } else {
            FieldPresence::Optional
        };
        push(field, presence);
    }
    for field in required {
        push(field, FieldPresence::Required);
    }
    reads
}

fn check_required(raw: &RawFieldBag, required: &[String]) -> Result<(), TransformError> {
    match required.iter().find(|field| raw.get(field).is_missing()) {
        Some(field) => Err(TransformError::MissingRequired { field: field.clone() }),
        None => Ok(()),
    }
}

fn read_optional_text(raw: &RawFieldBag, field: Option<&str>) -> Result<Option<String>, TransformError> {
    field.map_or(Ok(None), |field| read_text(raw, field))
}

/// Strings pass through; numbers and booleans are rendered as text
pub(crate) fn read_text(raw: &RawFieldBag, field: &str) -> Result<Option<String>, TransformError> {
    match raw.get(field) {
        RawField::Absent | RawField::Null => Ok(None),
        RawField::Value(Value::String(s)) => Ok(Some(s.clone())),
        RawField::Value(Value::Number(n)) => Ok(Some(n.to_string())),
        RawField::Value(Value::Bool(b)) => Ok(Some(b.to_string())),
        RawField::Value(other) => Err(unexpected_type(field, other)),
    }
}

/// Finite float from a JSON number or numeric string; blank strings are `None`
pub(crate) fn read_number(raw: &RawFieldBag, field: &str) -> Result<Option<f64>, TransformError> {
    match raw.get(field) {
        RawField::Absent | RawField::Null => Ok(None),
        RawField::Value(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| TransformError::InvalidNumber { field: field.to_string(), value: n.to_string() }),
        RawField::Value(Value::String(s)) => parse_float(field, s),
        RawField::Value(other) => Err(unexpected_type(field, other)),
    }
}

pub(crate) fn parse_float(field: &str, raw: &str) -> Result<Option<f64>, TransformError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(TransformError::InvalidNumber { field: field.to_string(), value: raw.to_string() }),
    }
}

pub(crate) fn unexpected_type(field: &str, value: &Value) -> TransformError {
    let found = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    TransformError::UnexpectedType { field: field.to_string(), found: found.to_string() }
}
