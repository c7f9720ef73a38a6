//! Diff between two registries.
//!
//! Computed before `list.json` is replaced so a run can report which
//! endpoints appeared and which disappeared. Informational only.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::Registry;

/// URLs added and removed between two registries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryDiff {
    /// In current but not in previous, in current's order
    pub added: Vec<String>,
    /// In previous but not in current, in previous's order
    pub removed: Vec<String>,
}

impl RegistryDiff {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Calculate the diff between previous and current registries.
pub fn calculate_diff(previous: &Registry, current: &Registry) -> RegistryDiff {
    let prev_urls: HashSet<&str> = previous.endpoints.iter().map(|e| e.url.as_str()).collect();
    let curr_urls: HashSet<&str> = current.endpoints.iter().map(|e| e.url.as_str()).collect();

    let added = current
        .endpoints
        .iter()
        .filter(|e| !prev_urls.contains(e.url.as_str()))
        .map(|e| e.url.clone())
        .collect();

    let removed = previous
        .endpoints
        .iter()
        .filter(|e| !curr_urls.contains(e.url.as_str()))
        .map(|e| e.url.clone())
        .collect();

    RegistryDiff { added, removed }
}
