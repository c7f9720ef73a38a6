// src/services/plc.rs

//! PLC directory log export client.
//!
//! Fetches one page of the append-only operation log per call. The export is
//! newline-delimited JSON ordered by `createdAt`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, LogRecord};
use crate::utils::http;

/// Source of log pages. Stateless; the caller owns the cursor.
#[async_trait]
pub trait LogPageFetcher: Send + Sync {
    /// Fetch up to `count` records created after `after`.
    async fn fetch_page(&self, after: DateTime<Utc>, count: usize) -> Result<Vec<LogRecord>>;
}

/// HTTP client for `GET <log_url>?after=..&count=..`.
pub struct PlcLogClient {
    client: Client,
    log_url: Url,
}

impl PlcLogClient {
    /// Build a client from the crawler settings.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = http::create_client(&config.user_agent, config.timeout_secs)?;
        Self::with_client(client, &config.log_url)
    }

    /// Use an existing HTTP client against `log_url`.
    pub fn with_client(client: Client, log_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            log_url: Url::parse(log_url)?,
        })
    }

    fn page_url(&self, after: DateTime<Utc>, count: usize) -> Result<Url> {
        let cursor = format_cursor(after);
        let count = count.to_string();
        Ok(Url::parse_with_params(
            self.log_url.as_str(),
            &[("after", cursor.as_str()), ("count", count.as_str())],
        )?)
    }

    async fn get_text(&self, url: Url) -> reqwest::Result<String> {
        self.client.get(url).send().await?.error_for_status()?.text().await
    }
}

#[async_trait]
impl LogPageFetcher for PlcLogClient {
    async fn fetch_page(&self, after: DateTime<Utc>, count: usize) -> Result<Vec<LogRecord>> {
        let url = self.page_url(after, count)?;
        log::debug!("Fetching log page {}", url);

        let body = self
            .get_text(url)
            .await
            .map_err(|e| AppError::crawl(format!("page after {}", format_cursor(after)), e))?;

        Ok(parse_page(&body))
    }
}

/// Render a cursor the way the export endpoint expects it.
pub fn format_cursor(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an NDJSON page body.
///
/// Blank lines are ignored. Lines that are not valid records are logged and
/// skipped, so the page cursor comes from the last record that did parse.
pub fn parse_page(body: &str) -> Vec<LogRecord> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<LogRecord>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping unparsable log line: {}", e);
                None
            }
        })
        .collect()
}
