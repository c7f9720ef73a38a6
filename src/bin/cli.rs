//! pdslist CLI
//!
//! Batch entry point; meant to be invoked by an external scheduler, one run at a time.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pdslist::{
    error::Result,
    models::Config,
    pipeline::{self, CrawlSummary, MergeSummary},
    services::{DescribeClient, PlcLogClient},
    storage::{LocalStorage, SnapshotStore},
    utils::{Clock, SystemClock},
};

/// pdslist - AT Protocol PDS registry crawler
#[derive(Parser, Debug)]
#[command(name = "pdslist", version, about = "AT Protocol PDS registry crawler")]
struct Cli {
    /// Path to storage directory containing config.toml, snapshots and outputs
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the log, probe endpoints and write a snapshot
    Crawl,

    /// Apply retention and rebuild the registry and report
    Merge,

    /// Run full pipeline: Crawl → Merge
    Run,

    /// Delete snapshots outside the retention window
    Gc,

    /// Validate configuration
    Validate,

    /// Show snapshot and registry info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn log_crawl(summary: &CrawlSummary) {
    log::info!(
        "Crawl: {} pages, {} records, stopped {:?}",
        summary.pages_fetched,
        summary.record_count,
        summary.stop_reason
    );
    log::info!(
        "Endpoints: {} ({} official, {} alive, {} dead)",
        summary.endpoint_count,
        summary.probe.official,
        summary.probe.alive,
        summary.probe.dead
    );
    log::info!("Snapshot saved to {}", summary.snapshot_path.display());
}

fn log_merge(summary: &MergeSummary) {
    log::info!(
        "Registry: {} endpoints from {} snapshots ({} official, {} third-party, {} without invite)",
        summary.endpoint_count,
        summary.snapshot_count,
        summary.counts.official,
        summary.counts.third_party,
        summary.counts.open_third_party
    );
    if summary.diff.has_changes() {
        log::info!(
            "Changes since last registry: +{} -{}",
            summary.diff.added.len(),
            summary.diff.removed.len()
        );
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("pdslist starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let storage = LocalStorage::with_config(&cli.storage_dir, config.storage.clone());
    let clock = SystemClock;

    match cli.command {
        Command::Crawl => {
            let fetcher = PlcLogClient::new(&config.crawler)?;
            let describer = DescribeClient::new(&config.crawler.user_agent, &config.probe)?;
            let summary =
                pipeline::run_crawl(&config, &fetcher, &describer, &storage, &clock).await?;
            log_crawl(&summary);
        }

        Command::Merge => {
            let summary = pipeline::run_merge(&config, &storage, clock.now()).await?;
            log_merge(&summary);
        }

        Command::Run => {
            let fetcher = PlcLogClient::new(&config.crawler)?;
            let describer = DescribeClient::new(&config.crawler.user_agent, &config.probe)?;

            let (crawl, merge) =
                pipeline::run_pipeline(&config, &fetcher, &describer, &storage, &clock).await?;
            log_crawl(&crawl);
            log_merge(&merge);

            log::info!("Pipeline complete!");
        }

        Command::Gc => {
            storage
                .gc(clock.now(), config.storage.retention_days)
                .await?;
        }

        Command::Validate => {
            log::info!("✓ Config OK");
        }

        Command::Info => {
            log::info!("Storage directory: {}", storage.root_dir().display());

            let snapshots = storage.list_snapshots().await?;
            log::info!("Snapshots: {}", snapshots.len());
            match snapshots.first() {
                Some(newest) => log::info!("Newest snapshot: {}", newest.taken_at),
                None => log::info!("No snapshot found yet."),
            }

            match storage.load_registry().await {
                Ok(Some(registry)) => log::info!("Registry: {} endpoints", registry.len()),
                Ok(None) => log::info!("No registry found yet."),
                Err(e) => log::warn!("Registry unreadable: {}", e),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
