//! Discovery against a fake control plane served over real HTTP
//!
//! Each test runs one or more small axum servers on localhost that answer
//! `/master/state.json` the way a cluster master would.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use exelixi::cluster::{
    discover_slaves, format_host_list, list_slaves, resolve_leader, ClusterAddress, DiscoveryError,
    HttpStateClient, StateClient, STATE_PATH,
};

/// Find an available port for testing
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to address")
        .local_addr()
        .expect("Failed to get local address")
        .port()
}

async fn serve(app: Router) -> ClusterAddress {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind control plane");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ClusterAddress::new("127.0.0.1", port)
}

async fn state_json(State(state): State<Arc<Value>>) -> Json<Value> {
    Json(state.as_ref().clone())
}

/// Serve a fixed state document
async fn fake_master(state: Value) -> ClusterAddress {
    let app = Router::new()
        .route(STATE_PATH, get(state_json))
        .with_state(Arc::new(state));
    serve(app).await
}

fn client(timeout: Duration) -> HttpStateClient {
    HttpStateClient::new(timeout).unwrap()
}

#[tokio::test]
async fn test_follower_redirects_to_leader() {
    let leader_port = find_available_port();
    let follower = fake_master(json!({
        "leader": format!("master@127.0.0.1:{}", leader_port),
        "slaves": []
    }))
    .await;

    let leader = resolve_leader(&client(Duration::from_secs(5)), &follower)
        .await
        .unwrap();
    assert_eq!(leader, ClusterAddress::new("127.0.0.1", leader_port));
}

#[tokio::test]
async fn test_enumerate_through_follower() {
    // The leader reports itself as leader; the follower points at it
    let leader_state = |addr: &str| {
        json!({
            "leader": format!("master@{}", addr),
            "slaves": [
                {"pid": "slave(1)@10.0.0.2:5051", "hostname": "worker-a"},
                {"pid": "slave(1)@10.0.0.3:5051", "hostname": "worker-b"}
            ]
        })
    };

    // Bind the leader first so its address is known to the follower
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let leader_addr = ClusterAddress::new("127.0.0.1", listener.local_addr().unwrap().port());
    let app = Router::new()
        .route(STATE_PATH, get(state_json))
        .with_state(Arc::new(leader_state(&leader_addr.to_string())));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let follower = fake_master(json!({
        "leader": format!("master@{}", leader_addr),
        "slaves": []
    }))
    .await;

    let http = client(Duration::from_secs(5));
    let (leader, slaves) = discover_slaves(&http, &follower).await.unwrap();
    assert_eq!(leader, leader_addr);
    assert_eq!(format_host_list(&slaves), "10.0.0.2 10.0.0.3");
}

#[tokio::test]
async fn test_list_slaves_empty_cluster() {
    let master = fake_master(json!({"leader": "master@127.0.0.1:5050", "slaves": []})).await;
    let slaves = list_slaves(&client(Duration::from_secs(5)), &master)
        .await
        .unwrap();
    assert!(slaves.is_empty());
    assert_eq!(format_host_list(&slaves), "");
}

#[tokio::test]
async fn test_leader_without_separator_is_format_error() {
    let master = fake_master(json!({"leader": "127.0.0.1:5050"})).await;
    let err = resolve_leader(&client(Duration::from_secs(5)), &master)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Format { .. }));
    assert_eq!(err.addr(), &master);
}

#[tokio::test]
async fn test_missing_slaves_field() {
    let master = fake_master(json!({"leader": "master@127.0.0.1:5050"})).await;
    let err = list_slaves(&client(Duration::from_secs(5)), &master)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DiscoveryError::MissingField {
            field: "slaves",
            ..
        }
    ));
}

async fn broken() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn not_json() -> Response {
    (StatusCode::OK, "<html>definitely not json</html>").into_response()
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!({"leader": "master@127.0.0.1:5050"}))
}

#[tokio::test]
async fn test_error_status() {
    let master = serve(Router::new().route(STATE_PATH, get(broken))).await;
    let err = client(Duration::from_secs(5))
        .fetch_state(&master)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_unparseable_body() {
    let master = serve(Router::new().route(STATE_PATH, get(not_json))).await;
    let err = client(Duration::from_secs(5))
        .fetch_state(&master)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Format { .. }));
}

#[tokio::test]
async fn test_slow_master_times_out() {
    let master = serve(Router::new().route(STATE_PATH, get(slow))).await;
    let err = client(Duration::from_millis(200))
        .fetch_state(&master)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Timeout { .. }));
}

#[tokio::test]
async fn test_nothing_listening() {
    let port = find_available_port();
    let err = client(Duration::from_secs(2))
        .fetch_state(&ClusterAddress::new("127.0.0.1", port))
        .await
        .unwrap_err();
    assert!(err.is_network());
}
