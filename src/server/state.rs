use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::feature::FeatureParameters;
use crate::telemetry::{Telemetry, TelemetryCollector};

/// Credentials every shard request carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCredentials {
    pub prefix: String,
    pub shard_id: String,
}

/// The shard this worker has been configured to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    #[serde(flatten)]
    pub credentials: ShardCredentials,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ff_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<FeatureParameters>,
    pub configured_at: DateTime<Utc>,
}

/// Shared worker service state
#[derive(Clone)]
pub struct WorkerState {
    pub port: u16,
    pub started_at: DateTime<Utc>,
    shard: Arc<RwLock<Option<ShardConfig>>>,
    telemetry: Arc<Mutex<TelemetryCollector>>,
    shutdown: CancellationToken,
}

impl WorkerState {
    pub fn new(port: u16, shutdown: CancellationToken) -> Self {
        Self {
            port,
            started_at: Utc::now(),
            shard: Arc::new(RwLock::new(None)),
            telemetry: Arc::new(Mutex::new(TelemetryCollector::new())),
            shutdown,
        }
    }

    /// Sample host telemetry; blocking, call from a blocking task
    pub fn sample_telemetry(&self) -> Telemetry {
        let mut collector = match self.telemetry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        collector.collect()
    }

    /// Configure the shard once; returns the existing shard if already set
    pub async fn configure(&self, config: ShardConfig) -> Result<(), ShardConfig> {
        let mut shard = self.shard.write().await;
        match shard.as_ref() {
            Some(existing) => Err(existing.clone()),
            None => {
                *shard = Some(config);
                Ok(())
            }
        }
    }

    pub async fn shard(&self) -> Option<ShardConfig> {
        self.shard.read().await.clone()
    }

    /// True when `credentials` name the configured shard
    pub async fn authorizes(&self, credentials: &ShardCredentials) -> bool {
        self.shard
            .read()
            .await
            .as_ref()
            .is_some_and(|s| &s.credentials == credentials)
    }

    /// Ask the service to stop accepting work and exit
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
