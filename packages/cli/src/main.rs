//! rulegraph-upgrade
//!
//! Loads a store snapshot, runs the data upgrade for one source version and
//! writes the upgraded snapshot back.
//!
//! ```text
//! rulegraph-upgrade --from-version 3.3.2 --snapshot data.json
//! RUST_LOG=rulegraph_core=debug rulegraph-upgrade --from-version 3.2.2 --snapshot data.json --dry-run
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rulegraph_core::config::UpgradeConfig;
use rulegraph_core::db::InMemoryStore;
use rulegraph_core::services::{DataUpdateService, UpgradeContext};

#[derive(Parser)]
#[command(author, version, about = "Upgrade persisted rule-engine data to the next release")]
struct Cli {
    /// Version the stored data is currently at (e.g. 3.3.2)
    #[arg(long)]
    from_version: String,
    /// JSON store snapshot to upgrade
    #[arg(long)]
    snapshot: PathBuf,
    /// Where to write the upgraded snapshot; defaults to overwriting the input
    #[arg(long)]
    output: Option<PathBuf>,
    /// JSON file with page sizes and progress settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run every step but do not write the result
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => UpgradeConfig::from_file(path)?,
        None => UpgradeConfig::default(),
    }
    .with_env_overrides()?;
    config.validate()?;

    let store = Arc::new(
        InMemoryStore::load(&cli.snapshot)
            .await
            .with_context(|| format!("failed to load snapshot {}", cli.snapshot.display()))?,
    );
    let service = DataUpdateService::new(UpgradeContext::in_memory(store.clone(), config));
    let report = match service.update_data(&cli.from_version).await {
        Ok(report) => report,
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!(
                "upgrade from {} stopped before completion; the snapshot was not written",
                cli.from_version
            )))
        }
    };

    tracing::info!(
        "Data updated to {} in {} ms: {} entities updated, {} failed",
        report.to_version(),
        report.elapsed().num_milliseconds(),
        report.updated(),
        report.failed()
    );
    if report.failed() > 0 {
        tracing::warn!("Some entities could not be updated; see the errors above");
    }

    if cli.dry_run {
        tracing::info!("Dry run, snapshot not written");
        return Ok(());
    }
    let output = cli.output.as_ref().unwrap_or(&cli.snapshot);
    store
        .save(output)
        .await
        .with_context(|| format!("failed to write snapshot {}", output.display()))?;
    tracing::info!("Wrote {}", output.display());
    Ok(())
}
