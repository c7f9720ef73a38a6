// src/pipeline/merge.rs

//! Fold of retained snapshots into the current registry.
//!
//! Snapshots arrive newest first, so the first value seen for a field is
//! already the latest one. Older snapshots only fill fields that are still
//! unknown; they never overwrite. `createdAt` is the maximum over all
//! snapshots mentioning the URL.

use std::collections::HashMap;

use crate::models::{EndpointRecord, Registry, Snapshot, sort_endpoints};

/// Builds a [`Registry`] from snapshots ordered newest first.
#[derive(Debug, Clone)]
pub struct RegistryMerger {
    official_suffix: String,
}

impl RegistryMerger {
    pub fn new(official_suffix: impl Into<String>) -> Self {
        Self {
            official_suffix: official_suffix.into(),
        }
    }

    /// Merge, drop endpoints resolved as dead, and sort.
    ///
    /// The result depends only on the snapshots and their order.
    pub fn merge<I>(&self, snapshots_newest_first: I) -> Registry
    where
        I: IntoIterator<Item = Snapshot>,
    {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut merged: Vec<EndpointRecord> = Vec::new();
        let mut started_at = None;

        for snapshot in snapshots_newest_first {
            started_at = Some(match started_at {
                Some(current) if current <= snapshot.started_at => current,
                _ => snapshot.started_at,
            });

            for record in snapshot.endpoints {
                match positions.get(&record.url) {
                    Some(&index) => {
                        let newer = merged[index].clone();
                        merged[index] = fill_gaps(newer, record);
                    }
                    None => {
                        positions.insert(record.url.clone(), merged.len());
                        merged.push(record);
                    }
                }
            }
        }

        let before = merged.len();
        let mut endpoints: Vec<EndpointRecord> =
            merged.into_iter().filter(|record| !record.is_dead()).collect();
        log::debug!(
            "Merged {} endpoints, dropped {} dead",
            before,
            before - endpoints.len()
        );

        sort_endpoints(&mut endpoints, &self.official_suffix);

        Registry {
            started_at,
            endpoints,
        }
    }
}

/// Combine a newer record with an older one for the same URL.
fn fill_gaps(newer: EndpointRecord, older: EndpointRecord) -> EndpointRecord {
    EndpointRecord {
        created_at: newer.created_at.max(older.created_at),
        alive: newer.alive.or(older.alive),
        invite_code_required: newer.invite_code_required.or(older.invite_code_required),
        phone_verification_required: newer
            .phone_verification_required
            .or(older.phone_verification_required),
        url: newer.url,
    }
}
