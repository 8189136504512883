use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::feature::FeatureParameters;
use crate::server::state::{ShardConfig, ShardCredentials, WorkerState};
use crate::telemetry::Telemetry;

/// Body of `POST /shard/config`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfigRequest {
    #[serde(flatten)]
    pub credentials: ShardCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ff_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<FeatureParameters>,
}

/// Service description returned by `GET /`
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub port: u16,
    pub started_at: chrono::DateTime<Utc>,
    pub shard: Option<ShardConfig>,
    pub telemetry: Telemetry,
}

/// Service info and host telemetry
pub async fn info(State(state): State<WorkerState>) -> Response {
    let sampler = state.clone();
    let telemetry = match tokio::task::spawn_blocking(move || sampler.sample_telemetry()).await {
        Ok(t) => t,
        Err(e) => {
            error!("Telemetry collection failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    Json(ServiceInfo {
        service: "exelixi-worker".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: state.port,
        started_at: state.started_at,
        shard: state.shard().await,
        telemetry,
    })
    .into_response()
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Configure the service to run a shard
pub async fn shard_config(
    State(state): State<WorkerState>,
    Json(request): Json<ShardConfigRequest>,
) -> impl IntoResponse {
    let config = ShardConfig {
        credentials: request.credentials,
        ff_name: request.ff_name,
        parameters: request.parameters,
        configured_at: Utc::now(),
    };
    let shard_id = config.credentials.shard_id.clone();
    let prefix = config.credentials.prefix.clone();

    match state.configure(config).await {
        Ok(()) => {
            info!(%shard_id, %prefix, "configured shard");
            (StatusCode::OK, "Bokay\r\n")
        }
        Err(existing) => {
            warn!(
                shard_id = %existing.credentials.shard_id,
                prefix = %existing.credentials.prefix,
                "denied configuring shard, executor already configured"
            );
            (
                StatusCode::CONFLICT,
                "Denied, executor already in a configured state\r\n",
            )
        }
    }
}

/// Shut the service down when the caller names the configured shard
pub async fn stop(
    State(state): State<WorkerState>,
    Json(credentials): Json<ShardCredentials>,
) -> impl IntoResponse {
    if state.authorizes(&credentials).await {
        info!(shard_id = %credentials.shard_id, "worker service stopping");
        state.request_shutdown();
        (StatusCode::OK, "Goodbye\r\n")
    } else {
        warn!(
            shard_id = %credentials.shard_id,
            prefix = %credentials.prefix,
            "incorrect shard in stop request"
        );
        (StatusCode::FORBIDDEN, "Incorrect shard\r\n")
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found\r\n")
}

/// Create the Axum router for the worker service
pub fn create_router(state: WorkerState) -> Router {
    Router::new()
        .route("/", get(info))
        .route("/health", get(health))
        .route("/shard/config", post(shard_config))
        .route("/stop", post(stop))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
