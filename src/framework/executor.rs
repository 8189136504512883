//! Managed executor: run the worker service on the framework port

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ExecutorRunner, FrameworkError};
use crate::config::Settings;
use crate::server::WorkerService;

/// Runs the worker service on the configured worker port until cancelled
pub struct ServiceExecutorRunner {
    bind_addr: String,
    port: u16,
}

impl ServiceExecutorRunner {
    pub fn new(settings: &Settings) -> Self {
        Self {
            bind_addr: settings.bind_addr.clone(),
            port: settings.worker_port,
        }
    }
}

#[async_trait]
impl ExecutorRunner for ServiceExecutorRunner {
    async fn run(&self, cancel: CancellationToken) -> Result<(), FrameworkError> {
        let service = WorkerService::new(self.bind_addr.clone(), self.port, &cancel);
        info!(addr = %service.addr(), "executor starting worker service");
        service.start().await?;
        Ok(())
    }
}
