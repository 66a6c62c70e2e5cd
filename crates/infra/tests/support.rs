//! Shared helpers for `crmsync-infra` integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use crmsync_core::SyncService;
use crmsync_domain::{Config, RawFieldBag, StagedRecord};
use crmsync_infra::config;
use crmsync_infra::database::{
    DbManager, SqliteCanonicalRepository, SqliteRelationshipRepository, SqliteWatermarkRepository,
};
use crmsync_infra::staging::{SqliteStagingTable, DEFAULT_STAGING_TABLES};
use crmsync_infra::sync::build_service;
use serde_json::Value;
use tempfile::TempDir;

pub const TEST_DB_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Path of the example configuration shipped at the workspace root
pub fn example_config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config.example.toml")
}

/// The example configuration: three reference customers
pub fn example_config() -> Config {
    config::load_from_file(Some(example_config_path())).expect("example config should load")
}

/// Temporary database with the full service wired over it
pub struct TestEnv {
    pub db: Arc<DbManager>,
    pub service: Arc<SyncService>,
    pub canonical: SqliteCanonicalRepository,
    pub watermarks: SqliteWatermarkRepository,
    pub relationships: SqliteRelationshipRepository,
    temp_dir: TempDir,
}

impl TestEnv {
    /// Environment for the example customers on an encrypted database
    pub fn new() -> Self {
        Self::with_config(example_config(), Some(TEST_DB_KEY))
    }

    pub fn with_config(config: Config, key: Option<&str>) -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db = Self::open(&temp_dir, key);
        let service = Arc::new(build_service(&config, Arc::clone(&db)).expect("service should wire"));

        Self {
            canonical: SqliteCanonicalRepository::new(Arc::clone(&db)),
            watermarks: SqliteWatermarkRepository::new(Arc::clone(&db)),
            relationships: SqliteRelationshipRepository::new(Arc::clone(&db)),
            service,
            db,
            temp_dir,
        }
    }

    fn open(temp_dir: &TempDir, key: Option<&str>) -> Arc<DbManager> {
        let manager = DbManager::new(temp_dir.path().join("crmsync.db"), 4, key)
            .expect("database manager should initialise");
        manager.run_migrations().expect("schema migrations should apply");
        Arc::new(manager)
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("crmsync.db")
    }

    /// Write a staged revision into the built-in table for `provider`/`object`
    pub async fn stage(&self, provider: &str, customer: &str, object: &str, record: StagedRecord) {
        let table = DEFAULT_STAGING_TABLES
            .iter()
            .find(|(p, o, _)| *p == provider && *o == object)
            .map(|(_, _, table)| *table)
            .expect("object should have a built-in staging table");

        SqliteStagingTable::new(Arc::clone(&self.db), table)
            .expect("valid table")
            .upsert_staged_record(provider, customer, &record)
            .await
            .expect("record should stage");
    }
}

pub fn ts(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().expect("valid timestamp")
}

pub fn live(external_id: &str, at_ms: i64, fields: &[(&str, Value)]) -> StagedRecord {
    let raw: RawFieldBag = fields.iter().map(|(k, v)| (*k, v.clone())).collect();
    StagedRecord::live(external_id, ts(at_ms), raw)
}

pub fn deleted(external_id: &str, at_ms: i64) -> StagedRecord {
    StagedRecord::deleted(external_id, ts(at_ms))
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
