// src/pipeline/crawl.rs

//! Cursor walk over the upstream log.
//!
//! Pages are fetched strictly one after another: each request's cursor is the
//! `createdAt` of the previous page's last record.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{CrawlerConfig, LogRecord};
use crate::services::{LogPageFetcher, format_cursor};

/// Why the walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An empty or single-record page.
    CaughtUp,
    /// `max_iterations` pages were consumed.
    IterationLimit,
    /// A page request failed; treated as end of data.
    TransportFailure,
    /// The last record of a page had no `createdAt`.
    MalformedRecord,
}

/// Records accumulated by one walk.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub records: Vec<LogRecord>,
    pub pages_fetched: usize,
    /// Cursor the walk would have resumed from
    pub cursor: DateTime<Utc>,
    pub stop_reason: StopReason,
}

/// Drives a [`LogPageFetcher`] from a start time until caught up or bounded.
pub struct CrawlCursorWalker<'a> {
    fetcher: &'a dyn LogPageFetcher,
    page_size: usize,
    max_iterations: usize,
    page_delay: Duration,
}

impl<'a> CrawlCursorWalker<'a> {
    pub fn new(fetcher: &'a dyn LogPageFetcher, config: &CrawlerConfig) -> Self {
        Self {
            fetcher,
            page_size: config.page_size.max(1),
            max_iterations: config.max_iterations,
            page_delay: Duration::from_millis(config.page_delay_ms),
        }
    }

    /// Walk the log from `started_at`.
    ///
    /// Never fails: transport and malformed-page problems end the walk early
    /// with whatever was accumulated.
    pub async fn walk(&self, started_at: DateTime<Utc>) -> CrawlOutcome {
        let mut cursor = started_at;
        let mut records = Vec::new();
        let mut pages_fetched = 0;

        for iteration in 0..self.max_iterations {
            let page = match self.fetcher.fetch_page(cursor, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    log::warn!(
                        "Log page fetch failed after {}: {}",
                        format_cursor(cursor),
                        e
                    );
                    return CrawlOutcome {
                        records,
                        pages_fetched,
                        cursor,
                        stop_reason: StopReason::TransportFailure,
                    };
                }
            };
            pages_fetched += 1;

            // A lone record may sit exactly on the cursor and would never advance it.
            if page.len() <= 1 {
                log::debug!("Caught up at {} ({} records)", format_cursor(cursor), page.len());
                return CrawlOutcome {
                    records,
                    pages_fetched,
                    cursor,
                    stop_reason: StopReason::CaughtUp,
                };
            }

            let Some(next_cursor) = page.last().and_then(|record| record.created_at) else {
                log::warn!(
                    "Last record of page after {} has no createdAt; stopping with {} records",
                    format_cursor(cursor),
                    records.len()
                );
                return CrawlOutcome {
                    records,
                    pages_fetched,
                    cursor,
                    stop_reason: StopReason::MalformedRecord,
                };
            };

            log::info!(
                "Page {}: {} records, cursor {} -> {}",
                iteration + 1,
                page.len(),
                format_cursor(cursor),
                format_cursor(next_cursor)
            );
            records.extend(page);
            cursor = next_cursor;

            if iteration + 1 < self.max_iterations && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        CrawlOutcome {
            records,
            pages_fetched,
            cursor,
            stop_reason: StopReason::IterationLimit,
        }
    }
}
