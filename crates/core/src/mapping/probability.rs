//! Probability normalisation
//!
//! Providers encode win probability three ways: a fraction already in
//! `[0, 1]`, a float percentage, or an integer percent picklist. All three
//! normalise to a fraction; anything outside `[0, 1]` after normalisation is
//! rejected rather than clamped.

use crmsync_domain::constants::{PERCENT_DIVISOR, PROBABILITY_MAX, PROBABILITY_MIN};
use crmsync_domain::{ProbabilityEncoding, ProbabilityFieldConfig, RawField, RawFieldBag, TransformError};
use serde_json::Value;

use super::transform::{parse_float, unexpected_type};

/// Raw field holding a probability, and how it is encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbabilityField {
    pub field: String,
    pub encoding: ProbabilityEncoding,
}

impl ProbabilityField {
    pub fn new(field: impl Into<String>, encoding: ProbabilityEncoding) -> Self {
        Self { field: field.into(), encoding }
    }

    pub fn from_config(config: &ProbabilityFieldConfig) -> Self {
        Self::new(config.field.clone(), config.encoding)
    }

    /// Read and normalise the field
    ///
    /// Absent, null and blank values yield `None`.
    ///
    /// # Errors
    /// `InvalidNumber` for unparseable values, `OutOfRange` when the
    /// normalised value falls outside `[0, 1]`.
    pub fn read(&self, raw: &RawFieldBag) -> Result<Option<f64>, TransformError> {
        let parsed = match raw.get(&self.field) {
            RawField::Absent | RawField::Null => None,
            RawField::Value(Value::String(s)) => self.parse_str(s)?,
            RawField::Value(Value::Number(n)) => Some(n.as_f64().filter(|v| v.is_finite()).ok_or_else(
                || TransformError::InvalidNumber { field: self.field.clone(), value: n.to_string() },
            )?),
            RawField::Value(other) => return Err(unexpected_type(&self.field, other)),
        };

        parsed.map(|value| self.normalise(value)).transpose()
    }

    fn parse_str(&self, raw: &str) -> Result<Option<f64>, TransformError> {
        match self.encoding {
            ProbabilityEncoding::Fraction | ProbabilityEncoding::Percentage => {
                parse_float(&self.field, raw)
            }
            ProbabilityEncoding::PercentPicklist => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<i64>()
                    .map(|percent| Some(percent as f64))
                    .map_err(|_| TransformError::InvalidNumber {
                        field: self.field.clone(),
                        value: raw.to_string(),
                    })
            }
        }
    }

    fn normalise(&self, value: f64) -> Result<f64, TransformError> {
        let fraction = match self.encoding {
            ProbabilityEncoding::Fraction => value,
            ProbabilityEncoding::Percentage | ProbabilityEncoding::PercentPicklist => {
                value / PERCENT_DIVISOR
            }
        };

        if (PROBABILITY_MIN..=PROBABILITY_MAX).contains(&fraction) {
            Ok(fraction)
        } else {
            Err(TransformError::OutOfRange { field: self.field.clone(), value: fraction })
        }
    }
}
