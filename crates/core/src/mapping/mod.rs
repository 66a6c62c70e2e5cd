//! Customer mappings from provider objects to canonical entities

pub mod probability;
pub mod registry;
pub mod transform;

pub use probability::ProbabilityField;
pub use registry::{Mapper, MapperRegistry};
pub use transform::{ContactTransform, EntityTransform, FieldPresence, FieldRead, OpportunityTransform};
