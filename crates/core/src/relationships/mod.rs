//! Cross-entity relationship reconciliation

pub mod resolver;

pub use resolver::RelationshipResolver;
