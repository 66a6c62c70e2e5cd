//! SQLite persistence for canonical entities, watermarks and relationships

pub mod canonical_repository;
pub(crate) mod columns;
pub mod manager;
pub mod relationship_repository;
pub mod watermark_repository;

pub use canonical_repository::SqliteCanonicalRepository;
pub use manager::DbManager;
pub use relationship_repository::SqliteRelationshipRepository;
pub use watermark_repository::SqliteWatermarkRepository;
