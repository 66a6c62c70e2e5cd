//! Domain types and models

pub mod entity;
pub mod event;
pub mod relationship;
pub mod staging;
pub mod sync;

pub use entity::{
    new_internal_id, CanonicalEntity, CanonicalFields, Contact, EntityKind, ExternalTriple, Opportunity,
};
pub use event::{
    BaseSyncComplete, EntitySyncComplete, ObjectSyncComplete, ObjectType, SyncCompleteEvent,
    SyncResultStatus,
};
pub use relationship::{NewRelationshipEdge, RelationshipEdge};
pub use staging::{RawField, RawFieldBag, StagedRecord};
pub use sync::{
    ResolveReport, SkipReason, SyncKey, SyncOutcome, SyncReport, SyncWatermark, TriggerOutcome,
};
