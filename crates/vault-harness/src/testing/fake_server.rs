//! Minimal vault HTTP API served from a `SimCluster`.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use harness_common::InitRequest;
use harness_common::constants::headers::X_VAULT_TOKEN;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;

use super::sim::{SimCluster, SimError};

#[derive(Clone)]
struct FakeState {
    cluster: SimCluster,
    node: usize,
}

/// One simulated node listening on an ephemeral localhost port
pub struct FakeVault {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FakeVault {
    /// Serve `node` of `cluster`
    pub async fn spawn(cluster: SimCluster, node: usize) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(FakeState { cluster, node });

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, handle }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for FakeVault {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: FakeState) -> Router {
    Router::new()
        .route("/v1/sys/init", get(init_status).put(initialize))
        .route("/v1/sys/seal-status", get(seal_status))
        .route("/v1/sys/unseal", put(unseal))
        .route("/v1/sys/leader", get(leader))
        .route("/v1/auth/token/lookup-self", get(lookup_self))
        .route(
            "/v1/{*path}",
            get(read_secret).put(write_secret).post(write_secret),
        )
        .with_state(state)
}

fn token(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_VAULT_TOKEN).and_then(|v| v.to_str().ok())
}

fn error_response(e: SimError) -> Response {
    let status = StatusCode::from_u16(e.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "errors": [e.message] }))).into_response()
}

async fn init_status(State(state): State<FakeState>) -> Json<Value> {
    Json(json!({ "initialized": state.cluster.sim_is_initialized() }))
}

async fn initialize(State(state): State<FakeState>, Json(body): Json<InitRequest>) -> Response {
    match state
        .cluster
        .sim_initialize(body.secret_shares, body.secret_threshold)
    {
        Ok(material) => Json(material).into_response(),
        Err(e) => error_response(e),
    }
}

async fn seal_status(State(state): State<FakeState>) -> Response {
    Json(state.cluster.sim_seal_status(state.node)).into_response()
}

#[derive(Deserialize)]
struct UnsealBody {
    key: String,
}

async fn unseal(State(state): State<FakeState>, Json(body): Json<UnsealBody>) -> Response {
    match state.cluster.sim_unseal(state.node, &body.key) {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(e),
    }
}

async fn leader(State(state): State<FakeState>) -> Response {
    Json(state.cluster.sim_ha_status(state.node)).into_response()
}

async fn lookup_self(State(state): State<FakeState>, headers: HeaderMap) -> Response {
    match state
        .cluster
        .sim_is_authenticated(state.node, token(&headers))
    {
        Ok(true) => Json(json!({ "data": { "policies": ["root"] } })).into_response(),
        Ok(false) => error_response(SimError {
            status: 403,
            message: "permission denied".to_string(),
        }),
        Err(e) => error_response(e),
    }
}

async fn read_secret(
    State(state): State<FakeState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    match state.cluster.sim_read(state.node, token(&headers), &path) {
        Ok(Some(secret)) => Json(secret).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "errors": [] }))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn write_secret(
    State(state): State<FakeState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    Json(fields): Json<Map<String, Value>>,
) -> Response {
    match state
        .cluster
        .sim_write(state.node, token(&headers), &path, &fields)
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
