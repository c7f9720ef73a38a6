//! Endpoint observations, probed records, snapshots and the merged registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns whether `url` belongs to the first-party domain `suffix`.
pub fn is_official(url: &str, suffix: &str) -> bool {
    url.trim_end_matches('/').ends_with(suffix)
}

/// Common view over observations and records, used by the sort policy.
pub trait Endpoint {
    fn url(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

/// Orders endpoints: official first, then most recently observed first.
///
/// Two stable passes; ties keep their incoming relative order.
pub fn sort_endpoints<T: Endpoint>(endpoints: &mut [T], official_suffix: &str) {
    endpoints.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    endpoints.sort_by_key(|e| !is_official(e.url(), official_suffix));
}

/// A distinct PDS URL seen during one crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointObservation {
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl Endpoint for EndpointObservation {
    fn url(&self) -> &str {
        &self.url
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Capability flags reported by a server's describe call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerDescription {
    pub invite_code_required: bool,
    pub phone_verification_required: bool,
}

impl ServerDescription {
    /// Read the flags out of any JSON document.
    ///
    /// A flag that is absent, `null` or not a boolean reads as `false`.
    pub fn from_json(document: &Value) -> Self {
        let flag = |key: &str| document.get(key).and_then(Value::as_bool).unwrap_or(false);
        Self {
            invite_code_required: flag("inviteCodeRequired"),
            phone_verification_required: flag("phoneVerificationRequired"),
        }
    }
}

/// An endpoint with liveness and capability information.
///
/// `None` means "not known": either never probed or the probe failed before
/// capabilities could be read. A missing `alive` is never treated as dead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRecord {
    pub url: String,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alive: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code_required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_verification_required: Option<bool>,
}

impl EndpointRecord {
    /// A record with nothing known beyond the observation itself.
    pub fn unprobed(observation: EndpointObservation) -> Self {
        Self {
            url: observation.url,
            created_at: observation.created_at,
            alive: None,
            invite_code_required: None,
            phone_verification_required: None,
        }
    }

    /// First-party endpoints are taken as alive with no sign-up restrictions.
    pub fn official(observation: EndpointObservation) -> Self {
        Self::unprobed(observation).with_description(ServerDescription::default())
    }

    /// A successfully described endpoint.
    pub fn described(observation: EndpointObservation, description: ServerDescription) -> Self {
        Self::unprobed(observation).with_description(description)
    }

    /// An endpoint whose probe failed.
    pub fn dead(observation: EndpointObservation) -> Self {
        Self {
            alive: Some(false),
            ..Self::unprobed(observation)
        }
    }

    fn with_description(self, description: ServerDescription) -> Self {
        Self {
            alive: Some(true),
            invite_code_required: Some(description.invite_code_required),
            phone_verification_required: Some(description.phone_verification_required),
            ..self
        }
    }

    pub fn is_dead(&self) -> bool {
        self.alive == Some(false)
    }
}

impl Endpoint for EndpointRecord {
    fn url(&self) -> &str {
        &self.url
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// One immutable crawl result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Lower bound of the crawled log window
    pub started_at: DateTime<Utc>,
    pub endpoints: Vec<EndpointRecord>,
}

/// The merged, dead-filtered, sorted view over all retained snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    /// Earliest `startedAt` of the merged snapshots; `None` when there were none
    pub started_at: Option<DateTime<Utc>>,
    pub endpoints: Vec<EndpointRecord>,
}

impl Registry {
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
