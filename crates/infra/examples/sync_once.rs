//! Example: run one sync trigger against a configured database
//!
//! Loads configuration (the same way a deployed worker does), opens the
//! database, and handles a single successful standard-object trigger for the
//! given provider, customer and object. The outcome is printed as JSON.
//!
//! ```bash
//! cargo run -p crmsync-infra --example sync_once -- \
//!     config.example.toml salesforce user2 Opportunity
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use crmsync_domain::SyncCompleteEvent;
use crmsync_infra::{build_service, config, init_tracing, open_database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [config_path, provider, customer, object] = args.as_slice() else {
        bail!("usage: sync_once <config> <provider> <customer> <object>");
    };

    let config = config::load_from_file(Some(PathBuf::from(config_path)))
        .context("failed to load configuration")?;
    init_tracing(&config.logging)?;

    let db = open_database(&config.database)?;
    let service = build_service(&config, db)?;

    let event = SyncCompleteEvent::standard_success(provider.as_str(), customer.as_str(), object.as_str());
    let outcome = service.handle_event(&event).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
