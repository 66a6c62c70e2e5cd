//! Incremental sync: ports, trigger filtering and the engine

pub mod engine;
pub mod ports;
pub mod trigger;

pub use engine::SyncEngine;
pub use ports::{CanonicalStore, RelationshipStore, StagedRecordReader, WatermarkStore};
pub use trigger::{filter_event, SyncRequest};
