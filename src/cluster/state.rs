//! Control-plane state client
//!
//! Fetches `/master/state.json` from a control-plane node and hands it back
//! as an opaque [`StateDocument`]. One request per call, no retries and no
//! caching; the only policy applied is the configured deadline.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::address::ClusterAddress;
use super::STATE_PATH;

/// Errors raised while discovering cluster topology
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("could not reach control plane at {addr}: {reason}")]
    Network { addr: ClusterAddress, reason: String },

    #[error("control plane at {addr} did not answer within {timeout:?}")]
    Timeout {
        addr: ClusterAddress,
        timeout: Duration,
    },

    #[error("control plane at {addr} returned HTTP {status}")]
    Status { addr: ClusterAddress, status: u16 },

    #[error("malformed state from {addr}: {reason}")]
    Format { addr: ClusterAddress, reason: String },

    #[error("state from {addr} has no '{field}' field")]
    MissingField {
        addr: ClusterAddress,
        field: &'static str,
    },
}

impl DiscoveryError {
    /// True for connection failures, timeouts and non-success statuses
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Status { .. }
        )
    }

    /// Address of the control-plane node that was being queried
    pub fn addr(&self) -> &ClusterAddress {
        match self {
            Self::Network { addr, .. }
            | Self::Timeout { addr, .. }
            | Self::Status { addr, .. }
            | Self::Format { addr, .. }
            | Self::MissingField { addr, .. } => addr,
        }
    }
}

/// Decoded control-plane state, read-only.
///
/// Remembers the address it was fetched from so extraction failures can name
/// the node that produced them.
#[derive(Debug, Clone)]
pub struct StateDocument {
    source: ClusterAddress,
    fields: Map<String, Value>,
}

impl StateDocument {
    /// Wrap an already-decoded JSON value; anything but an object is rejected
    pub fn from_value(source: ClusterAddress, value: Value) -> Result<Self, DiscoveryError> {
        match value {
            Value::Object(fields) => Ok(Self { source, fields }),
            other => Err(DiscoveryError::Format {
                addr: source,
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    /// Decode a raw response body
    pub fn from_slice(source: ClusterAddress, body: &[u8]) -> Result<Self, DiscoveryError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| DiscoveryError::Format {
            addr: source.clone(),
            reason: e.to_string(),
        })?;
        Self::from_value(source, value)
    }

    pub fn source(&self) -> &ClusterAddress {
        &self.source
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Look up a field that must be present
    pub fn require(&self, field: &'static str) -> Result<&Value, DiscoveryError> {
        self.fields
            .get(field)
            .ok_or_else(|| DiscoveryError::MissingField {
                addr: self.source.clone(),
                field,
            })
    }

    /// Build a format error attributed to this document's source
    pub fn format_error(&self, reason: impl Into<String>) -> DiscoveryError {
        DiscoveryError::Format {
            addr: self.source.clone(),
            reason: reason.into(),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

#[async_trait]
pub trait StateClient: Send + Sync {
    async fn fetch_state(&self, addr: &ClusterAddress) -> Result<StateDocument, DiscoveryError>;
}

// ============================================================================
// SBIO: I/O implementation (real HTTP client)
// ============================================================================

#[derive(Clone)]
pub struct HttpStateClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpStateClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request_error(&self, addr: &ClusterAddress, e: reqwest::Error) -> DiscoveryError {
        if e.is_timeout() {
            DiscoveryError::Timeout {
                addr: addr.clone(),
                timeout: self.timeout,
            }
        } else {
            DiscoveryError::Network {
                addr: addr.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl StateClient for HttpStateClient {
    async fn fetch_state(&self, addr: &ClusterAddress) -> Result<StateDocument, DiscoveryError> {
        let url = format!("{}{}", addr.base_url(), STATE_PATH);
        debug!(%url, "fetching control plane state");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(addr, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                addr: addr.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(addr, e))?;

        StateDocument::from_slice(addr.clone(), &body)
    }
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================
