// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod endpoint;
mod record;

// Re-export all public types
pub use config::{Config, CrawlerConfig, ProbeConfig, StorageConfig};
pub use endpoint::{
    Endpoint, EndpointObservation, EndpointRecord, Registry, ServerDescription, Snapshot,
    is_official, sort_endpoints,
};
pub use record::{LogRecord, Operation, PDS_SERVICE_KEY, PDS_SERVICE_TYPE, ServiceDescriptor};
