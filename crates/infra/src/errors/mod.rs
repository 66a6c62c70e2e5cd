//! Infrastructure error conversions

mod conversions;

pub use conversions::InfraError;
pub(crate) use conversions::{map_join_error, map_sql_error, map_storage_error};
