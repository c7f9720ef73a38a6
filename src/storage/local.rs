//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── list.json             # Registry (rewritten every merge)
//! ├── README.md             # Report (rewritten every merge)
//! └── log/
//!     └── list-<millis>.json
//! ```
//!
//! All writes go to a temp file first and are renamed into place, so a
//! crashed run never leaves a half-written snapshot or registry behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Registry, Snapshot, StorageConfig};
use crate::storage::{
    GcReport, SnapshotEntry, SnapshotStore, parse_snapshot_name, snapshot_file_name,
};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    config: StorageConfig,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory with the default layout.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_config(root_dir, StorageConfig::default())
    }

    /// Create a LocalStorage with a custom layout.
    pub fn with_config(root_dir: impl Into<PathBuf>, config: StorageConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            config,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn snapshot_dir(&self) -> PathBuf {
        self.path(&self.config.snapshot_dir)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir(path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(path, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match self.read_bytes(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SnapshotStore for LocalStorage {
    async fn write_snapshot(
        &self,
        snapshot: &Snapshot,
        completed_at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let path = self.snapshot_dir().join(snapshot_file_name(completed_at));
        if tokio::fs::try_exists(&path).await? {
            return Err(AppError::SnapshotExists { path });
        }

        self.write_json(&path, snapshot).await?;
        log::info!(
            "Snapshot: {} endpoints written to {}",
            snapshot.endpoints.len(),
            path.display()
        );
        Ok(path)
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotEntry>> {
        let dir = self.snapshot_dir();
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name();
            let Some(taken_at) = name.to_str().and_then(parse_snapshot_name) else {
                log::debug!("Ignoring non-snapshot file {:?}", name);
                continue;
            };
            entries.push(SnapshotEntry {
                taken_at,
                path: entry.path(),
            });
        }

        entries.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));
        Ok(entries)
    }

    async fn load_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for entry in self.list_snapshots().await? {
            match self.read_json::<Snapshot>(&entry.path).await {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => log::warn!("Snapshot vanished: {}", entry.path.display()),
                Err(e) => log::warn!(
                    "Skipping unreadable snapshot {}: {}",
                    entry.path.display(),
                    e
                ),
            }
        }
        Ok(snapshots)
    }

    async fn gc(&self, now: DateTime<Utc>, retention_days: u32) -> Result<GcReport> {
        // A window reaching past the earliest representable instant keeps everything.
        let cutoff = now.checked_sub_signed(Duration::days(i64::from(retention_days)));
        let mut report = GcReport::default();

        for entry in self.list_snapshots().await? {
            if cutoff.is_none_or(|cutoff| entry.taken_at >= cutoff) {
                report.retained += 1;
                continue;
            }
            match tokio::fs::remove_file(&entry.path).await {
                Ok(()) => {
                    log::debug!("Deleted expired snapshot {}", entry.path.display());
                    report.deleted += 1;
                }
                Err(e) => {
                    log::warn!(
                        "Failed to delete expired snapshot {}: {}",
                        entry.path.display(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Retention ({} days): {} deleted, {} retained, {} failed",
            retention_days,
            report.deleted,
            report.retained,
            report.failed
        );
        Ok(report)
    }

    async fn load_registry(&self) -> Result<Option<Registry>> {
        self.read_json(&self.path(&self.config.registry_file)).await
    }

    async fn write_registry(&self, registry: &Registry) -> Result<()> {
        let path = self.path(&self.config.registry_file);
        self.write_json(&path, registry).await?;
        log::info!(
            "Registry: {} endpoints written to {}",
            registry.len(),
            path.display()
        );
        Ok(())
    }

    async fn write_report(&self, report: &str) -> Result<()> {
        let path = self.path(&self.config.report_file);
        self.write_bytes(&path, report.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EndpointRecord;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn snapshot(url: &str, started: i64) -> Snapshot {
        Snapshot {
            started_at: at(started),
            endpoints: vec![EndpointRecord {
                url: url.to_string(),
                created_at: at(started),
                alive: Some(true),
                invite_code_required: Some(false),
                phone_verification_required: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_write_and_load_newest_first() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_snapshot(&snapshot("old", 0), at(1_000)).await.unwrap();
        storage.write_snapshot(&snapshot("new", 10), at(2_000)).await.unwrap();

        let loaded = storage.load_snapshots().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].endpoints[0].url, "new");
        assert_eq!(loaded[1], snapshot("old", 0));

        assert!(tmp.path().join("log/list-1000000.json").exists());
    }

    #[tokio::test]
    async fn test_snapshot_is_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_snapshot(&snapshot("a", 0), at(1_000)).await.unwrap();
        let second = storage.write_snapshot(&snapshot("b", 0), at(1_000)).await;

        assert!(matches!(second, Err(AppError::SnapshotExists { .. })));
        let loaded = storage.load_snapshots().await.unwrap();
        assert_eq!(loaded[0].endpoints[0].url, "a");
    }

    #[tokio::test]
    async fn test_missing_snapshot_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.list_snapshots().await.unwrap().is_empty());
        assert_eq!(
            storage.gc(at(0), 30).await.unwrap(),
            GcReport::default()
        );
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_snapshot(&snapshot("good", 0), at(1_000)).await.unwrap();
        std::fs::write(tmp.path().join("log/list-2000000.json"), b"{ not json").unwrap();

        let loaded = storage.load_snapshots().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].endpoints[0].url, "good");
    }

    #[tokio::test]
    async fn test_gc_by_embedded_timestamp() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let day = 86_400;
        let now = at(100 * day);

        storage.write_snapshot(&snapshot("expired", 0), at(60 * day)).await.unwrap();
        storage.write_snapshot(&snapshot("boundary", 0), at(70 * day)).await.unwrap();
        storage.write_snapshot(&snapshot("fresh", 0), at(99 * day)).await.unwrap();
        std::fs::write(tmp.path().join("log/notes.txt"), b"keep me").unwrap();
        std::fs::write(tmp.path().join("log/list-abc.json"), b"{}").unwrap();

        let report = storage.gc(now, 30).await.unwrap();

        assert_eq!(
            report,
            GcReport {
                deleted: 1,
                retained: 2,
                failed: 0
            }
        );
        let remaining: Vec<_> = storage
            .list_snapshots()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.taken_at)
            .collect();
        assert_eq!(remaining, vec![at(99 * day), at(70 * day)]);
        assert!(tmp.path().join("log/notes.txt").exists());
        assert!(tmp.path().join("log/list-abc.json").exists());
    }

    #[tokio::test]
    async fn test_gc_huge_retention_keeps_everything() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_snapshot(&snapshot("ancient", 0), at(1)).await.unwrap();
        storage.write_snapshot(&snapshot("recent", 0), at(1_714_521_600)).await.unwrap();

        let report = storage.gc(at(1_714_521_600), 200_000_000).await.unwrap();

        assert_eq!(report.deleted, 0);
        assert_eq!(report.retained, 2);
        assert_eq!(storage.list_snapshots().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_gc_continues_after_delete_failure() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        // A directory with a snapshot name cannot be removed with remove_file.
        std::fs::create_dir_all(tmp.path().join("log/list-1000.json")).unwrap();
        storage.write_snapshot(&snapshot("old", 0), at(2)).await.unwrap();

        let report = storage.gc(at(365 * 86_400), 30).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.deleted, 1);
        assert!(!tmp.path().join("log/list-2000.json").exists());
    }

    #[tokio::test]
    async fn test_registry_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.load_registry().await.unwrap().is_none());

        let registry = Registry {
            started_at: Some(at(0)),
            endpoints: snapshot("a", 0).endpoints,
        };
        storage.write_registry(&registry).await.unwrap();
        storage.write_report("# report\n").await.unwrap();

        assert_eq!(storage.load_registry().await.unwrap(), Some(registry));
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("README.md")).unwrap(),
            "# report\n"
        );
    }

    #[tokio::test]
    async fn test_custom_layout() {
        let tmp = TempDir::new().unwrap();
        let config = StorageConfig {
            snapshot_dir: "history".to_string(),
            registry_file: "pds.json".to_string(),
            ..StorageConfig::default()
        };
        let storage = LocalStorage::with_config(tmp.path(), config);

        storage.write_snapshot(&snapshot("a", 0), at(1)).await.unwrap();
        storage.write_registry(&Registry::default()).await.unwrap();

        assert!(tmp.path().join("history/list-1000.json").exists());
        assert!(tmp.path().join("pds.json").exists());
    }
}
