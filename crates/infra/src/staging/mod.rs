//! Provider staging tables and the accessor registry the engine reads through

pub mod registry;
pub mod table;

pub use registry::{StagingRegistry, DEFAULT_STAGING_TABLES};
pub use table::{SqliteStagingTable, StagedRecordSource};
