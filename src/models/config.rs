//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream log crawling settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Endpoint liveness probing settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Snapshot, registry and report locations
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_iterations == 0 {
            return Err(AppError::validation("crawler.max_iterations must be > 0"));
        }
        if self.crawler.page_size == 0 {
            return Err(AppError::validation("crawler.page_size must be > 0"));
        }
        url::Url::parse(&self.crawler.log_url)
            .map_err(|e| AppError::validation(format!("crawler.log_url is invalid: {e}")))?;

        if self.probe.timeout_secs == 0 {
            return Err(AppError::validation("probe.timeout_secs must be > 0"));
        }
        if self.probe.max_concurrent == 0 {
            return Err(AppError::validation("probe.max_concurrent must be > 0"));
        }
        if self.probe.official_suffix.trim().is_empty() {
            return Err(AppError::validation("probe.official_suffix is empty"));
        }

        if self.storage.retention_days == 0 {
            return Err(AppError::validation("storage.retention_days must be > 0"));
        }
        if self.storage.snapshot_dir.trim().is_empty() {
            return Err(AppError::validation("storage.snapshot_dir is empty"));
        }
        Ok(())
    }
}

/// Upstream log source and cursor walk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Export endpoint of the PLC directory log
    #[serde(default = "defaults::log_url")]
    pub log_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// How far back the crawl starts, in days
    #[serde(default = "defaults::lookback_days")]
    pub lookback_days: u32,

    /// Upper bound on pages fetched per run
    #[serde(default = "defaults::max_iterations")]
    pub max_iterations: usize,

    /// Records requested per page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            log_url: defaults::log_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            lookback_days: defaults::lookback_days(),
            max_iterations: defaults::max_iterations(),
            page_size: defaults::page_size(),
            page_delay_ms: defaults::page_delay(),
        }
    }
}

/// Endpoint describe probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Path appended to each endpoint URL
    #[serde(default = "defaults::describe_path")]
    pub describe_path: String,

    /// First-party domain suffix; matching endpoints are never probed
    #[serde(default = "defaults::official_suffix")]
    pub official_suffix: String,

    /// Probes in flight at once (1 keeps them sequential)
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay after each probe in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Per-probe timeout in seconds
    #[serde(default = "defaults::probe_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            describe_path: defaults::describe_path(),
            official_suffix: defaults::official_suffix(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
            timeout_secs: defaults::probe_timeout(),
        }
    }
}

/// On-disk layout and retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory (relative to the storage root) holding snapshot files
    #[serde(default = "defaults::snapshot_dir")]
    pub snapshot_dir: String,

    /// Snapshots older than this many days are deleted
    #[serde(default = "defaults::retention_days")]
    pub retention_days: u32,

    /// Merged registry file name
    #[serde(default = "defaults::registry_file")]
    pub registry_file: String,

    /// Human-readable report file name
    #[serde(default = "defaults::report_file")]
    pub report_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: defaults::snapshot_dir(),
            retention_days: defaults::retention_days(),
            registry_file: defaults::registry_file(),
            report_file: defaults::report_file(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn log_url() -> String {
        "https://plc.directory/export".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; pdslist/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn lookback_days() -> u32 {
        7
    }
    pub fn max_iterations() -> usize {
        70
    }
    pub fn page_size() -> usize {
        1000
    }
    pub fn page_delay() -> u64 {
        1000
    }

    // Probe defaults
    pub fn describe_path() -> String {
        "xrpc/com.atproto.server.describeServer".into()
    }
    pub fn official_suffix() -> String {
        "bsky.network".into()
    }
    pub fn max_concurrent() -> usize {
        1
    }
    pub fn probe_timeout() -> u64 {
        10
    }

    // Storage defaults
    pub fn snapshot_dir() -> String {
        "log".into()
    }
    pub fn retention_days() -> u32 {
        30
    }
    pub fn registry_file() -> String {
        "list.json".into()
    }
    pub fn report_file() -> String {
        "README.md".into()
    }
}
