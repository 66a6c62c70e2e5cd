//! Domain-level constants

/// Opportunity probability lower bound after normalisation
pub const PROBABILITY_MIN: f64 = 0.0;
/// Opportunity probability upper bound after normalisation
pub const PROBABILITY_MAX: f64 = 1.0;

/// Divisor applied to percentage-encoded probabilities
pub const PERCENT_DIVISOR: f64 = 100.0;

/// Maximum bound parameters per `IN (...)` lookup against the canonical store
pub const EXTERNAL_ID_LOOKUP_CHUNK: usize = 500;

/// Event name the ingestion provider publishes when a sync batch completes
pub const SYNC_COMPLETED_EVENT: &str = "sync.completed";
