//! Framework worker service
//!
//! Long-running HTTP service each slave runs for the framework. It accepts a
//! shard configuration, reports host telemetry and stops either on a
//! credentialed `/stop` request or when its cancellation token fires.

pub mod handlers;
pub mod state;

pub use handlers::{create_router, ServiceInfo, ShardConfigRequest};
pub use state::{ShardConfig, ShardCredentials, WorkerState};

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Errors from running the worker service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Failed to bind worker service to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker service error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Worker service bound to one port
pub struct WorkerService {
    bind_addr: String,
    port: u16,
    shutdown: CancellationToken,
}

impl WorkerService {
    /// Create a service that stops when `cancel` (or its own stop) fires
    pub fn new(bind_addr: impl Into<String>, port: u16, cancel: &CancellationToken) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            port,
            shutdown: cancel.child_token(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Bind and serve until stopped
    pub async fn start(&self) -> Result<(), ServiceError> {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServiceError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until stopped.
    ///
    /// The listener is consumed, so it is released however serving ends.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServiceError> {
        let local: SocketAddr = listener.local_addr()?;
        let state = WorkerState::new(local.port(), self.shutdown.clone());
        let app = create_router(state);

        info!(addr = %local, "worker service listening");

        let token = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;

        info!(addr = %local, "worker service stopped");
        Ok(())
    }

    /// Stop accepting new work and let `start` return
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
