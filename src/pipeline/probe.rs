// src/pipeline/probe.rs

//! Endpoint liveness probing.
//!
//! Each non-official endpoint gets one describe request. Results are
//! independent per URL, so probes may run through a bounded, order-preserving
//! pool (`probe.max_concurrent`); the default of 1 keeps them sequential.

use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::models::{EndpointObservation, EndpointRecord, ProbeConfig, is_official};
use crate::services::EndpointDescriber;

/// Counts from one probe pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeStats {
    pub official: usize,
    pub alive: usize,
    pub dead: usize,
}

pub struct LivenessProbe<'a> {
    describer: &'a dyn EndpointDescriber,
    official_suffix: String,
    concurrency: usize,
    delay: Duration,
}

impl<'a> LivenessProbe<'a> {
    pub fn new(describer: &'a dyn EndpointDescriber, config: &ProbeConfig) -> Self {
        Self {
            describer,
            official_suffix: config.official_suffix.clone(),
            concurrency: config.max_concurrent.max(1),
            delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    /// Probe every observation, returning records in input order.
    ///
    /// No retries: a failed probe marks the endpoint dead for this run only.
    pub async fn probe_all(
        &self,
        observations: Vec<EndpointObservation>,
    ) -> (Vec<EndpointRecord>, ProbeStats) {
        let total = observations.len();
        let mut stats = ProbeStats::default();
        let mut records = Vec::with_capacity(total);

        let mut probes = stream::iter(observations)
            .map(|observation| self.probe_one(observation))
            .buffered(self.concurrency);

        while let Some((record, probed)) = probes.next().await {
            if !probed {
                stats.official += 1;
            } else if record.is_dead() {
                stats.dead += 1;
            } else {
                stats.alive += 1;
            }
            records.push(record);

            if probed && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        log::info!(
            "Probed {} endpoints: {} official, {} alive, {} dead",
            total,
            stats.official,
            stats.alive,
            stats.dead
        );
        (records, stats)
    }

    /// Returns the record and whether a request was actually made.
    async fn probe_one(&self, observation: EndpointObservation) -> (EndpointRecord, bool) {
        if is_official(&observation.url, &self.official_suffix) {
            return (EndpointRecord::official(observation), false);
        }

        match self.describer.describe(&observation.url).await {
            Ok(description) => (EndpointRecord::described(observation, description), true),
            Err(e) => {
                log::warn!("Probe failed for {}: {}", observation.url, e);
                (EndpointRecord::dead(observation), true)
            }
        }
    }
}
