//! REST client for slave worker services

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::FrameworkError;
use crate::cluster::ClusterAddress;
use crate::server::{ShardConfigRequest, ShardCredentials};

/// Posts shard lifecycle messages to worker services
#[derive(Clone)]
pub struct ShardClient {
    client: reqwest::Client,
}

impl ShardClient {
    pub fn new(timeout: Duration) -> Result<Self, FrameworkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Configure the worker at `addr` to run a shard
    pub async fn configure(
        &self,
        addr: &ClusterAddress,
        request: &ShardConfigRequest,
    ) -> Result<String, FrameworkError> {
        self.post_json(addr, "shard/config", request).await
    }

    /// Ask the worker at `addr` to stop
    pub async fn stop(
        &self,
        addr: &ClusterAddress,
        credentials: &ShardCredentials,
    ) -> Result<String, FrameworkError> {
        self.post_json(addr, "stop", credentials).await
    }

    /// True when the worker at `addr` answers its health check
    pub async fn is_alive(&self, addr: &ClusterAddress) -> bool {
        let url = format!("{}/health", addr.base_url());
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        addr: &ClusterAddress,
        path: &str,
        body: &T,
    ) -> Result<String, FrameworkError> {
        let url = format!("{}/{}", addr.base_url(), path);
        debug!(%addr, path, "send");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| FrameworkError::Unreachable {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FrameworkError::Unreachable {
                addr: addr.clone(),
                reason: format!("failed to read /{} response: {}", path, e),
            })?;

        if !status.is_success() {
            return Err(FrameworkError::Rejected {
                addr: addr.clone(),
                path: format!("/{}", path),
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }

        Ok(text)
    }
}
