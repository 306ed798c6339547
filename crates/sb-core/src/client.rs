//! Steward control-plane client
//!
//! Used by routers and storage instances to register, heartbeat, and fetch
//! the routing table over the steward's HTTP API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::instance::NodeRole;
use crate::routing::RoutingTable;

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("API returned no data")]
    MissingData,
}

/// One error entry in an API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

/// Response envelope used by the admin API
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ApiError>>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: Some(vec![ApiError {
                message: message.into(),
            }]),
        }
    }

    /// Unwrap the envelope, mapping the first error message to `ClientError`.
    pub fn into_result(self) -> Result<T, ClientError> {
        if let Some(errors) = self.errors {
            let message = errors
                .into_iter()
                .next()
                .map(|e| e.message)
                .unwrap_or_default();
            return Err(ClientError::Api(message));
        }
        self.data.ok_or(ClientError::MissingData)
    }
}

/// Registration payload sent by an instance at boot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInstance {
    pub instance_uuid: Uuid,
    pub replicaset_uuid: Uuid,
    pub role: NodeRole,
    pub binary_addr: String,
    pub http_addr: Option<String>,
}

/// Registration outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegisterOutcome {
    pub is_new: bool,
}

/// Steward HTTP client
#[derive(Clone)]
pub struct StewardClient {
    base_url: String,
    http: reqwest::Client,
}

impl StewardClient {
    /// Create a client; `request_timeout` bounds every ordinary request.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    /// Register the instance with the steward
    pub async fn register(&self, req: &RegisterInstance) -> Result<RegisterOutcome, ClientError> {
        let url = format!("{}/api/v1/instances", self.base_url);
        let resp: ApiEnvelope<RegisterOutcome> =
            self.http.post(&url).json(req).send().await?.json().await?;
        resp.into_result()
    }

    /// Send a heartbeat for the instance
    pub async fn heartbeat(&self, instance_uuid: Uuid) -> Result<(), ClientError> {
        let url = format!(
            "{}/api/v1/instances/{}/heartbeat",
            self.base_url, instance_uuid
        );
        let resp: ApiEnvelope<bool> = self.http.post(&url).send().await?.json().await?;
        resp.into_result()?;
        Ok(())
    }

    /// Fetch the current routing table
    pub async fn fetch_routing(&self) -> Result<RoutingTable, ClientError> {
        let url = format!("{}/api/v1/routing", self.base_url);
        let resp: ApiEnvelope<RoutingTable> = self.http.get(&url).send().await?.json().await?;
        let table = resp.into_result()?;
        debug!("Fetched routing table version {}", table.version);
        Ok(table)
    }

    /// Long-poll for a routing table newer than `version`.
    ///
    /// The steward answers as soon as the version moves, or with the current
    /// table once its own hold timeout passes. `wait` must exceed the
    /// server-side hold so a quiet cluster still gets a response.
    pub async fn watch_routing(
        &self,
        version: u64,
        wait: Duration,
    ) -> Result<RoutingTable, ClientError> {
        let url = format!("{}/api/v1/routing/watch", self.base_url);
        let resp: ApiEnvelope<RoutingTable> = self
            .http
            .get(&url)
            .query(&[("version", version)])
            .timeout(wait)
            .send()
            .await?
            .json()
            .await?;
        resp.into_result()
    }
}
