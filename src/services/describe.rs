// src/services/describe.rs

//! PDS self-description client.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::{ProbeConfig, ServerDescription};
use crate::utils::http;

/// Queries an endpoint's describe interface.
#[async_trait]
pub trait EndpointDescriber: Send + Sync {
    /// Any error means the endpoint could not be described right now.
    async fn describe(&self, endpoint_url: &str) -> Result<ServerDescription>;
}

/// HTTP client for `GET <endpoint>/<describe_path>`.
pub struct DescribeClient {
    client: Client,
    describe_path: String,
}

impl DescribeClient {
    /// Build a client from the probe settings.
    pub fn new(user_agent: &str, config: &ProbeConfig) -> Result<Self> {
        let client = http::create_client(user_agent, config.timeout_secs)?;
        Ok(Self::with_client(client, &config.describe_path))
    }

    pub fn with_client(client: Client, describe_path: &str) -> Self {
        Self {
            client,
            describe_path: describe_path.to_string(),
        }
    }
}

#[async_trait]
impl EndpointDescriber for DescribeClient {
    async fn describe(&self, endpoint_url: &str) -> Result<ServerDescription> {
        let url = http::join_path(endpoint_url, &self.describe_path);
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let document: serde_json::Value = serde_json::from_slice(&body)?;
        Ok(ServerDescription::from_json(&document))
    }
}
