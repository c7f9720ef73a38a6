//! Storage abstractions for snapshot persistence.
//!
//! Every crawl is written once as an immutable, timestamp-named snapshot.
//! The registry and report are derived files, rebuilt from the retained
//! snapshots on every merge.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Crawler configuration
//! ├── list.json             # Merged registry
//! ├── README.md             # Human-readable report
//! └── log/                  # Snapshot history (append-only, retention GC)
//!     ├── list-1714521600000.json
//!     └── list-1714608000000.json
//! ```

pub mod local;

use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::Result;
use crate::models::{Registry, Snapshot};

// Re-export for convenience
pub use local::LocalStorage;

static SNAPSHOT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^list-(\d+)\.json$").expect("snapshot name pattern is valid")
});

/// File name for a snapshot completed at `completed_at`.
pub fn snapshot_file_name(completed_at: DateTime<Utc>) -> String {
    format!("list-{}.json", completed_at.timestamp_millis())
}

/// Timestamp embedded in a snapshot file name, if the name is well-formed.
pub fn parse_snapshot_name(name: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = SNAPSHOT_NAME.captures(name)?.get(1)?.as_str().parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

/// A snapshot file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Completion instant parsed from the file name
    pub taken_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// Outcome of a retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    pub deleted: usize,
    pub retained: usize,
    /// Expired files whose deletion failed
    pub failed: usize,
}

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a new snapshot named after `completed_at`.
    ///
    /// Fails with `SnapshotExists` rather than overwrite an existing one.
    async fn write_snapshot(
        &self,
        snapshot: &Snapshot,
        completed_at: DateTime<Utc>,
    ) -> Result<PathBuf>;

    /// Well-named snapshot files, newest first.
    async fn list_snapshots(&self) -> Result<Vec<SnapshotEntry>>;

    /// All readable snapshots, newest first. Corrupt files are skipped.
    async fn load_snapshots(&self) -> Result<Vec<Snapshot>>;

    /// Delete snapshots whose embedded timestamp is older than
    /// `now - retention_days`. Per-file failures are logged and counted.
    async fn gc(&self, now: DateTime<Utc>, retention_days: u32) -> Result<GcReport>;

    /// The last written registry, if any.
    async fn load_registry(&self) -> Result<Option<Registry>>;

    async fn write_registry(&self, registry: &Registry) -> Result<()>;

    async fn write_report(&self, report: &str) -> Result<()>;
}
