//! Framework collaborators
//!
//! The role dispatcher hands off to these interfaces:
//! - [`SchedulerLauncher`] starts a framework against a resolved leader
//! - [`StandaloneOrchestrator`] starts a framework on an explicit slave list
//! - [`ExecutorRunner`] runs an executor until told to stop
//!
//! The built-in implementations drive each slave's worker service over REST.

pub mod executor;
pub mod launcher;
pub mod shard;

pub use executor::ServiceExecutorRunner;
pub use launcher::{RestFramework, RestFrameworkLauncher, RestOrchestrator};
pub use shard::ShardClient;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cluster::{ClusterAddress, DiscoveryError};
use crate::feature::ParameterProvider;
use crate::server::ServiceError;

/// Errors raised by framework collaborators
#[derive(Error, Debug)]
pub enum FrameworkError {
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Could not reach worker service at {addr}: {reason}")]
    Unreachable { addr: ClusterAddress, reason: String },

    #[error("Worker service at {addr} rejected {path}: HTTP {status} {body}")]
    Rejected {
        addr: ClusterAddress,
        path: String,
        status: u16,
        body: String,
    },

    #[error("No slaves available to run executors")]
    NoSlaves,

    #[error("Worker service failed: {0}")]
    Service(#[from] ServiceError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// A framework that has been launched and is running
#[async_trait]
pub trait RunningFramework: Send {
    /// Resolves once the framework has terminated
    async fn wait(&mut self) -> Result<(), FrameworkError>;

    /// Shutdown hand-off, called after `wait` returns or on interruption
    async fn shutdown(self: Box<Self>) -> Result<(), FrameworkError>;
}

pub type FrameworkHandle = Box<dyn RunningFramework>;

/// Launches a framework on a managed cluster
#[async_trait]
pub trait SchedulerLauncher: Send + Sync {
    async fn launch(
        &self,
        leader: &ClusterAddress,
        executable: &Path,
        executors: u32,
        feature: Arc<dyn ParameterProvider>,
    ) -> Result<FrameworkHandle, FrameworkError>;
}

/// Starts a framework on an explicit list of slaves
#[async_trait]
pub trait StandaloneOrchestrator: Send + Sync {
    async fn orchestrate(
        &self,
        slaves: &[ClusterAddress],
        feature: Arc<dyn ParameterProvider>,
    ) -> Result<FrameworkHandle, FrameworkError>;
}

/// Runs this process as an executor until stopped
#[async_trait]
pub trait ExecutorRunner: Send + Sync {
    async fn run(&self, cancel: CancellationToken) -> Result<(), FrameworkError>;
}

/// The set of collaborators a dispatcher hands off to
#[derive(Clone)]
pub struct Collaborators {
    pub launcher: Arc<dyn SchedulerLauncher>,
    pub orchestrator: Arc<dyn StandaloneOrchestrator>,
    pub executor: Arc<dyn ExecutorRunner>,
}

// ============================================================================
// SBIO: Mock implementations for testing (no I/O)
// ============================================================================
