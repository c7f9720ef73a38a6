//! Upstream PLC log records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Service key under `operation.services` that names a PDS.
pub const PDS_SERVICE_KEY: &str = "atproto_pds";

/// Descriptor type marking a personal data server.
pub const PDS_SERVICE_TYPE: &str = "AtprotoPersonalDataServer";

/// One entry of the upstream log export.
///
/// Only the fields the crawl needs are modelled; everything else in the
/// upstream payload is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Cursor field; the next page starts after the last record's value.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub operation: Option<Operation>,
}

/// The signed operation carried by a log record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub services: Option<HashMap<String, ServiceDescriptor>>,
}

/// A service entry inside an operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceDescriptor {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub endpoint: Option<String>,
}

impl LogRecord {
    /// The PDS endpoint this record announces, if it carries a well-formed one.
    pub fn pds_endpoint(&self) -> Option<&str> {
        let service = self
            .operation
            .as_ref()?
            .services
            .as_ref()?
            .get(PDS_SERVICE_KEY)?;

        if service.kind.as_deref() != Some(PDS_SERVICE_TYPE) {
            return None;
        }

        service
            .endpoint
            .as_deref()
            .filter(|endpoint| !endpoint.trim().is_empty())
    }
}
