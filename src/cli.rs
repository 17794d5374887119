//! Command line surface: offline replay of recorded update sets.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inventory_sync_config::CollectorConfig;
use inventory_sync_core::test_utils::{MemoryEntityStore, ScriptedConnection};
use inventory_sync_core::{Collector, RunReport};
use inventory_sync_protocol::{LocalEntity, UpdateSet, VirtualizationFacet};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inventory-sync")]
#[command(about = "Incremental virtualization inventory synchronization", long_about = None)]
pub struct Cli {
    /// Log filter, e.g. `debug` or `inventory_sync_core=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one collector pass against recorded update sets and an in-memory store.
    Replay(ReplayArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Compute resource the entities belong to
    #[arg(long)]
    pub compute_resource: String,

    /// JSON array of update sets; `null` entries are polls without updates
    #[arg(long)]
    pub updates: PathBuf,

    /// JSON array of local entities to seed the store with
    #[arg(long)]
    pub entities: PathBuf,

    /// Collector config (TOML); defaults plus environment overrides otherwise
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Result of a replay: the run report and every facet written.
#[derive(Debug, Serialize)]
pub struct ReplayOutput {
    pub report: RunReport,
    pub facets: Vec<VirtualizationFacet>,
}

pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub async fn replay(args: &ReplayArgs) -> Result<ReplayOutput> {
    let config = match &args.config {
        Some(path) => CollectorConfig::from_file(path)?.with_env_overrides()?,
        None => CollectorConfig::default().with_env_overrides()?,
    };
    let recording: Vec<Option<UpdateSet>> = read_json(&args.updates)?;
    let entities: Vec<LocalEntity> = read_json(&args.entities)?;

    // Recordings carry the filter handle of the original session.
    let recorded_filter = recording
        .iter()
        .flatten()
        .flat_map(|set| set.filter_updates.iter())
        .map(|update| update.filter.clone())
        .next();

    info!(
        update_sets = recording.len(),
        entities = entities.len(),
        "Replaying recorded updates"
    );

    let mut connection = ScriptedConnection::from_recording(recording);
    if let Some(filter) = recorded_filter {
        connection = connection.with_filter(filter);
    }
    let connection = Arc::new(connection);
    let store = Arc::new(MemoryEntityStore::with_entities(entities));

    let collector = Collector::new(
        args.compute_resource.clone(),
        connection,
        store.clone(),
        config,
    );
    let report = collector.run().await?;

    Ok(ReplayOutput {
        report,
        facets: store.facets(),
    })
}
