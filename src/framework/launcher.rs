//! REST-driven framework launch
//!
//! Both scheduler roles end up here: pick the worker services to use, give
//! each one a shard of the run (prefix + shard id), then watch them until
//! none is left alive. Shutdown posts `/stop` to every shard.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::shard::ShardClient;
use super::{
    FrameworkError, FrameworkHandle, RunningFramework, SchedulerLauncher, StandaloneOrchestrator,
};
use crate::cluster::{list_slaves, ClusterAddress, StateClient};
use crate::config::Settings;
use crate::feature::ParameterProvider;
use crate::server::{ShardConfigRequest, ShardCredentials};

/// How often a running framework checks whether its workers are still up
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Fresh working prefix for one framework run
pub fn new_run_prefix(root: &str) -> String {
    format!("{}{}", root, Uuid::new_v4().simple())
}

/// A framework whose shards live on remote worker services
pub struct RestFramework {
    prefix: String,
    shards: Vec<(ClusterAddress, ShardCredentials)>,
    client: ShardClient,
    poll_interval: Duration,
}

impl RestFramework {
    /// Configure one shard per worker, in order.
    ///
    /// If any worker refuses, the shards configured so far are stopped and
    /// the error is returned.
    pub async fn start(
        client: ShardClient,
        prefix: String,
        workers: &[ClusterAddress],
        feature: &dyn ParameterProvider,
        poll_interval: Duration,
    ) -> Result<Self, FrameworkError> {
        if workers.is_empty() {
            return Err(FrameworkError::NoSlaves);
        }

        let mut framework = Self {
            prefix,
            shards: Vec::with_capacity(workers.len()),
            client,
            poll_interval,
        };

        for (index, addr) in workers.iter().enumerate() {
            let credentials = ShardCredentials {
                prefix: framework.prefix.clone(),
                shard_id: index.to_string(),
            };
            let request = ShardConfigRequest {
                credentials: credentials.clone(),
                ff_name: Some(feature.name().to_string()),
                parameters: Some(feature.parameters()),
            };

            if let Err(e) = framework.client.configure(addr, &request).await {
                warn!(%addr, "shard configuration failed, stopping configured shards");
                framework.stop_all().await;
                return Err(e);
            }

            info!(%addr, shard_id = index, "shard configured");
            framework.shards.push((addr.clone(), credentials));
        }

        info!(
            prefix = %framework.prefix,
            shards = framework.shards.len(),
            "framework running"
        );
        Ok(framework)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn shards(&self) -> &[(ClusterAddress, ShardCredentials)] {
        &self.shards
    }

    async fn alive_count(&self) -> usize {
        let mut alive = 0;
        for (addr, _) in &self.shards {
            if self.client.is_alive(addr).await {
                alive += 1;
            }
        }
        alive
    }

    async fn stop_all(&self) {
        for (addr, credentials) in &self.shards {
            match self.client.stop(addr, credentials).await {
                Ok(_) => info!(%addr, shard_id = %credentials.shard_id, "shard stopped"),
                Err(FrameworkError::Unreachable { .. }) => {
                    debug!(%addr, "shard already gone")
                }
                Err(e) => warn!(%addr, "failed to stop shard: {}", e),
            }
        }
    }
}

#[async_trait]
impl RunningFramework for RestFramework {
    async fn wait(&mut self) -> Result<(), FrameworkError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let alive = self.alive_count().await;
            debug!(alive, total = self.shards.len(), "framework health poll");
            if alive == 0 {
                info!(prefix = %self.prefix, "all shards have terminated");
                return Ok(());
            }
        }
    }

    async fn shutdown(self: Box<Self>) -> Result<(), FrameworkError> {
        info!(prefix = %self.prefix, "framework shutting down");
        self.stop_all().await;
        Ok(())
    }
}

/// Launches a framework on the slaves registered with a managed cluster's leader
pub struct RestFrameworkLauncher {
    state_client: Arc<dyn StateClient>,
    shards: ShardClient,
    worker_port: u16,
    prefix_root: String,
    poll_interval: Duration,
}

impl RestFrameworkLauncher {
    pub fn new(state_client: Arc<dyn StateClient>, shards: ShardClient, settings: &Settings) -> Self {
        Self {
            state_client,
            shards,
            worker_port: settings.worker_port,
            prefix_root: settings.prefix.clone(),
            poll_interval: HEALTH_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl SchedulerLauncher for RestFrameworkLauncher {
    async fn launch(
        &self,
        leader: &ClusterAddress,
        executable: &Path,
        executors: u32,
        feature: Arc<dyn ParameterProvider>,
    ) -> Result<FrameworkHandle, FrameworkError> {
        let slaves = list_slaves(self.state_client.as_ref(), leader).await?;
        let workers: Vec<ClusterAddress> = slaves
            .iter()
            .take(executors as usize)
            .map(|s| s.worker_address(self.worker_port))
            .collect();

        if workers.len() < executors as usize {
            warn!(
                requested = executors,
                available = workers.len(),
                "fewer slaves than requested executors"
            );
        }

        info!(
            %leader,
            executable = %executable.display(),
            executors = workers.len(),
            "launching framework"
        );

        let framework = RestFramework::start(
            self.shards.clone(),
            new_run_prefix(&self.prefix_root),
            &workers,
            feature.as_ref(),
            self.poll_interval,
        )
        .await?;
        Ok(Box::new(framework))
    }
}

/// Starts a framework on an explicit slave list
pub struct RestOrchestrator {
    shards: ShardClient,
    prefix_root: String,
    poll_interval: Duration,
}

impl RestOrchestrator {
    pub fn new(shards: ShardClient, settings: &Settings) -> Self {
        Self {
            shards,
            prefix_root: settings.prefix.clone(),
            poll_interval: HEALTH_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl StandaloneOrchestrator for RestOrchestrator {
    async fn orchestrate(
        &self,
        slaves: &[ClusterAddress],
        feature: Arc<dyn ParameterProvider>,
    ) -> Result<FrameworkHandle, FrameworkError> {
        let framework = RestFramework::start(
            self.shards.clone(),
            new_run_prefix(&self.prefix_root),
            slaves,
            feature.as_ref(),
            self.poll_interval,
        )
        .await?;
        Ok(Box::new(framework))
    }
}
