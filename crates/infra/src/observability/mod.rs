//! Tracing initialisation
//!
//! `RUST_LOG` wins when set; otherwise the configured level is used as the
//! filter directive. Output goes to stderr, either human-readable or as one
//! JSON object per line.

use crmsync_domain::{CrmSyncError, LoggingConfig, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Install the global subscriber
///
/// Calling this again after a subscriber is installed is a no-op.
///
/// # Errors
/// `CrmSyncError::Config` when `RUST_LOG` is unset and `config.level` is
/// not a valid filter directive.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.level)?,
    };

    let output: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer().json().with_current_span(true).with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_target(true).with_writer(std::io::stderr).boxed()
    };

    match tracing_subscriber::registry().with(output).with(filter).try_init() {
        Ok(()) => {
            tracing::debug!(json = config.json, level = %config.level, "tracing initialised");
            Ok(())
        }
        Err(err) => {
            tracing::debug!(error = %err, "global subscriber already installed");
            Ok(())
        }
    }
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| CrmSyncError::Config(format!("invalid log level '{level}': {e}")))
}
