//! # CrmSync Domain
//!
//! Provider-agnostic data model for incremental CRM synchronisation.
//!
//! This crate contains:
//! - Canonical entities (contacts, opportunities) and their external triples
//! - Staged records as produced by the ingestion provider
//! - Sync watermarks, relationship edges and trigger events
//! - Configuration structures and the domain error type
//!
//! ## Architecture
//! - No dependencies on other CrmSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
