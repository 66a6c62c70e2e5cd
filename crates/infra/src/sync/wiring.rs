//! Construction of the sync service over the SQLite adapters

use std::sync::Arc;

use crmsync_core::{MapperRegistry, RelationshipResolver, SyncEngine, SyncService};
use crmsync_domain::{Config, DatabaseConfig, Result};
use tracing::info;

use crate::database::{
    DbManager, SqliteCanonicalRepository, SqliteRelationshipRepository, SqliteWatermarkRepository,
};
use crate::staging::StagingRegistry;

/// Open the configured database and apply the schema
pub fn open_database(config: &DatabaseConfig) -> Result<Arc<DbManager>> {
    let db = DbManager::new(&config.path, config.pool_size, config.encryption_key.as_deref())?;
    db.run_migrations()?;
    Ok(Arc::new(db))
}

/// Wire the mapper registry, staging registry and repositories into a
/// [`SyncService`]
pub fn build_service(config: &Config, db: Arc<DbManager>) -> Result<SyncService> {
    let registry = Arc::new(MapperRegistry::from_configs(&config.customers)?);
    let staging = Arc::new(StagingRegistry::from_config(Arc::clone(&db), &config.staging)?);

    let canonical = Arc::new(SqliteCanonicalRepository::new(Arc::clone(&db)));
    let watermarks = Arc::new(SqliteWatermarkRepository::new(Arc::clone(&db)));
    let relationships = Arc::new(SqliteRelationshipRepository::new(db));

    info!(
        customers = config.customers.len(),
        staging_sources = staging.len(),
        "sync service wired"
    );

    let engine = Arc::new(SyncEngine::new(
        registry,
        staging,
        canonical.clone(),
        watermarks,
        relationships.clone(),
    ));
    let resolver = Arc::new(RelationshipResolver::new(canonical, relationships));

    Ok(SyncService::new(engine, resolver))
}
