//! Pipeline stages and entry points.
//!
//! - `crawl`: cursor walk over the upstream log
//! - `extract`: records to distinct endpoint observations
//! - `probe`: liveness and capability probing
//! - `merge`: snapshot history to registry
//! - `report`: registry to markdown
//! - `run`: `run_crawl`, `run_merge`, `run_pipeline`

pub mod crawl;
pub mod diff;
pub mod extract;
pub mod merge;
pub mod probe;
pub mod report;
pub mod run;

pub use crawl::{CrawlCursorWalker, CrawlOutcome, StopReason};
pub use diff::{RegistryDiff, calculate_diff};
pub use extract::extract_endpoints;
pub use merge::RegistryMerger;
pub use probe::{LivenessProbe, ProbeStats};
pub use report::{ReportCounts, render_report};
pub use run::{CrawlSummary, MergeSummary, run_crawl, run_merge, run_pipeline, window_start};
