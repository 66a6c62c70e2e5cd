//! # CrmSync Core
//!
//! Business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The mapper registry and declarative field transforms
//! - Port interfaces (traits) for staging, canonical, watermark and
//!   relationship stores
//! - The incremental sync engine and the relationship resolver
//!
//! ## Architecture Principles
//! - Only depends on `crmsync-domain`
//! - No database or platform code
//! - All external dependencies via traits

pub mod mapping;
pub mod relationships;
pub mod service;
pub mod sync;

pub use mapping::{Mapper, MapperRegistry};
pub use relationships::RelationshipResolver;
pub use service::SyncService;
pub use sync::ports::{CanonicalStore, RelationshipStore, StagedRecordReader, WatermarkStore};
pub use sync::SyncEngine;
