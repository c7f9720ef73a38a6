// src/pipeline/run.rs

//! Pipeline entry points.
//!
//! `run_crawl` produces one snapshot; `run_merge` applies retention and
//! rebuilds the registry and report from whatever snapshots remain.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::models::{Config, Snapshot, sort_endpoints};
use crate::pipeline::crawl::{CrawlCursorWalker, StopReason};
use crate::pipeline::diff::{RegistryDiff, calculate_diff};
use crate::pipeline::extract::extract_endpoints;
use crate::pipeline::merge::RegistryMerger;
use crate::pipeline::probe::{LivenessProbe, ProbeStats};
use crate::pipeline::report::{ReportCounts, render_report};
use crate::services::{EndpointDescriber, LogPageFetcher};
use crate::storage::{GcReport, SnapshotStore};
use crate::utils::Clock;

/// What one crawl did.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub run_time: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub pages_fetched: usize,
    pub record_count: usize,
    pub stop_reason: StopReason,
    pub endpoint_count: usize,
    pub probe: ProbeStats,
    pub snapshot_path: PathBuf,
}

/// What one merge did.
#[derive(Debug, Clone)]
pub struct MergeSummary {
    pub gc: GcReport,
    pub snapshot_count: usize,
    pub endpoint_count: usize,
    pub counts: ReportCounts,
    pub diff: RegistryDiff,
}

/// Lower bound of the crawl window, clamped to the earliest representable instant.
pub fn window_start(run_time: DateTime<Utc>, lookback_days: u32) -> DateTime<Utc> {
    run_time
        .checked_sub_signed(Duration::days(i64::from(lookback_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Crawl the log window ending at the clock's "now", probe, and write a snapshot.
pub async fn run_crawl(
    config: &Config,
    fetcher: &dyn LogPageFetcher,
    describer: &dyn EndpointDescriber,
    store: &dyn SnapshotStore,
    clock: &dyn Clock,
) -> Result<CrawlSummary> {
    let run_time = clock.now();
    let started_at = window_start(run_time, config.crawler.lookback_days);
    log::info!(
        "Crawling log from {} (at most {} pages of {})",
        started_at,
        config.crawler.max_iterations,
        config.crawler.page_size
    );

    let outcome = CrawlCursorWalker::new(fetcher, &config.crawler)
        .walk(started_at)
        .await;
    log::info!(
        "Crawl stopped ({:?}) after {} pages, {} records",
        outcome.stop_reason,
        outcome.pages_fetched,
        outcome.records.len()
    );

    let mut observations = extract_endpoints(&outcome.records);
    sort_endpoints(&mut observations, &config.probe.official_suffix);
    let endpoint_count = observations.len();
    log::info!("Found {} distinct PDS endpoints", endpoint_count);

    let (endpoints, probe) = LivenessProbe::new(describer, &config.probe)
        .probe_all(observations)
        .await;

    let snapshot = Snapshot {
        started_at,
        endpoints,
    };
    let completed_at = clock.now();
    let snapshot_path = store.write_snapshot(&snapshot, completed_at).await?;

    Ok(CrawlSummary {
        run_time,
        started_at,
        completed_at,
        pages_fetched: outcome.pages_fetched,
        record_count: outcome.records.len(),
        stop_reason: outcome.stop_reason,
        endpoint_count,
        probe,
        snapshot_path,
    })
}

/// Apply retention, then rebuild the registry and report from the remaining snapshots.
pub async fn run_merge(
    config: &Config,
    store: &dyn SnapshotStore,
    run_time: DateTime<Utc>,
) -> Result<MergeSummary> {
    let gc = store.gc(run_time, config.storage.retention_days).await?;

    let snapshots = store.load_snapshots().await?;
    let snapshot_count = snapshots.len();
    let registry = RegistryMerger::new(config.probe.official_suffix.as_str()).merge(snapshots);
    log::info!(
        "Merged {} snapshots into {} endpoints",
        snapshot_count,
        registry.len()
    );

    let previous = store.load_registry().await.unwrap_or_else(|e| {
        log::warn!("Previous registry unreadable, diffing against empty: {}", e);
        None
    });
    let diff = calculate_diff(&previous.unwrap_or_default(), &registry);
    if diff.has_changes() {
        log::info!(
            "Diff: {} added, {} removed",
            diff.added.len(),
            diff.removed.len()
        );
    }

    store.write_registry(&registry).await?;

    let report = render_report(
        &registry,
        run_time,
        &config.probe.official_suffix,
        &config.storage.registry_file,
    );
    store.write_report(&report).await?;

    Ok(MergeSummary {
        gc,
        snapshot_count,
        endpoint_count: registry.len(),
        counts: ReportCounts::from_registry(&registry, &config.probe.official_suffix),
        diff,
    })
}

/// Run the full pipeline: crawl, then merge at the crawl's run time.
pub async fn run_pipeline(
    config: &Config,
    fetcher: &dyn LogPageFetcher,
    describer: &dyn EndpointDescriber,
    store: &dyn SnapshotStore,
    clock: &dyn Clock,
) -> Result<(CrawlSummary, MergeSummary)> {
    let crawl = run_crawl(config, fetcher, describer, store, clock).await?;
    let merge = run_merge(config, store, crawl.run_time).await?;
    Ok((crawl, merge))
}
