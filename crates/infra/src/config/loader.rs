//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `CRMSYNC_DB_PATH` is unset, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `CRMSYNC_DB_PATH`: Database file path (required for env loading)
//! - `CRMSYNC_DB_POOL_SIZE`: Connection pool size
//! - `CRMSYNC_DB_ENCRYPTION_KEY`: SQLCipher key
//! - `CRMSYNC_SYNC_MAX_CONCURRENT_RUNS`: Runs allowed in flight
//! - `CRMSYNC_SYNC_RUN_TIMEOUT_SECS`: Upper bound on one run
//! - `CRMSYNC_LOG_LEVEL`: Default tracing filter
//! - `CRMSYNC_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! Customer mappings and staging registrations only come from files, so an
//! environment-only configuration has no customers and every run skips.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{toml,json}` and `./crmsync.{toml,json}`
//! 2. The same names one and two directories up
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};

use crmsync_core::MapperRegistry;
use crmsync_domain::{Config, CrmSyncError, DatabaseConfig, LoggingConfig, Result, SyncConfig};

use crate::staging::table::validate_identifier;

const CONFIG_FILE_NAMES: [&str; 4] = ["config.toml", "config.json", "crmsync.toml", "crmsync.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CrmSyncError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Validation fails
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `CrmSyncError::Config` if `CRMSYNC_DB_PATH` is missing or any
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("CRMSYNC_DB_PATH")?;
    let defaults = Config::default();

    let pool_size = env_parse("CRMSYNC_DB_POOL_SIZE", defaults.database.pool_size)?;
    let encryption_key = std::env::var("CRMSYNC_DB_ENCRYPTION_KEY").ok().filter(|key| !key.is_empty());

    let max_concurrent_runs =
        env_parse("CRMSYNC_SYNC_MAX_CONCURRENT_RUNS", defaults.sync.max_concurrent_runs)?;
    let run_timeout_secs = env_parse("CRMSYNC_SYNC_RUN_TIMEOUT_SECS", defaults.sync.run_timeout_secs)?;

    let level = std::env::var("CRMSYNC_LOG_LEVEL").unwrap_or(defaults.logging.level);
    let json = env_bool("CRMSYNC_LOG_JSON", defaults.logging.json);

    let config = Config {
        database: DatabaseConfig { path: db_path, pool_size, encryption_key },
        sync: SyncConfig { max_concurrent_runs, run_timeout_secs, ..defaults.sync },
        logging: LoggingConfig { level, json },
        customers: Vec::new(),
        staging: Vec::new(),
    };

    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations (see
/// [`probe_config_paths`]).
///
/// # Errors
/// Returns `CrmSyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CrmSyncError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CrmSyncError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CrmSyncError::Config(format!("Failed to read config file: {}", e)))?;

    let mut config = parse_config(&contents, &config_path)?;
    if let Ok(key) = std::env::var("CRMSYNC_DB_ENCRYPTION_KEY") {
        if !key.is_empty() {
            config.database.encryption_key = Some(key);
        }
    }

    validate(&config)?;
    tracing::info!(
        customers = config.customers.len(),
        staging_overrides = config.staging.len(),
        "Configuration validated"
    );
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
pub fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CrmSyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CrmSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CrmSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Check settings and mappings before anything is built from them
///
/// Mapping rules are the ones [`MapperRegistry::from_configs`] enforces, so
/// a config that validates here always builds a registry.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.path.trim().is_empty() {
        return Err(CrmSyncError::Config("database.path must not be empty".into()));
    }
    if config.database.pool_size == 0 {
        return Err(CrmSyncError::Config("database.pool_size must be at least 1".into()));
    }
    if config.sync.max_concurrent_runs == 0 {
        return Err(CrmSyncError::Config("sync.max_concurrent_runs must be at least 1".into()));
    }
    if config.sync.queue_capacity == 0 {
        return Err(CrmSyncError::Config("sync.queue_capacity must be at least 1".into()));
    }
    if config.sync.run_timeout_secs == 0 {
        return Err(CrmSyncError::Config("sync.run_timeout_secs must be at least 1".into()));
    }

    for staging in &config.staging {
        if staging.provider_name.trim().is_empty() || staging.object.trim().is_empty() {
            return Err(CrmSyncError::Config(format!(
                "staging table '{}' needs a provider and an object",
                staging.table
            )));
        }
        validate_identifier(&staging.table)?;
    }

    MapperRegistry::from_configs(&config.customers)?;
    Ok(())
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CrmSyncError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional environment variable, falling back to `default`
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| CrmSyncError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
