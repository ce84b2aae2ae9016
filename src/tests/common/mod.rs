// tests/common/mod.rs
pub use axum::Router;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use http::{HeaderMap, StatusCode};
use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::credential::store::CredentialStore;
use crate::errors::RefreshError;
use crate::pipeline::pipeline::RequestPipeline;
use crate::refresh::coordinator::RefreshCoordinator;
use crate::refresh::endpoint::RefreshEndpoint;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Poll `condition` until it holds; panics after two seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// -------------------------------
// Scripted refresh endpoint
// -------------------------------

#[derive(Debug, Clone)]
pub enum Script {
    Token(String),
    Fail,
    Hang,
    Panic,
}

pub struct MockEndpoint {
    calls: Arc<AtomicUsize>,
    script: Script,
    gate: Option<watch::Receiver<bool>>,
}

impl MockEndpoint {
    pub fn new(script: Script) -> Self {
        Self { calls: Arc::new(AtomicUsize::new(0)), script, gate: None }
    }

    /// Endpoint that blocks every call until `true` is sent on the returned gate.
    pub fn gated(script: Script) -> (Self, watch::Sender<bool>) {
        let (gate_tx, gate_rx) = watch::channel(false);
        let mut endpoint = Self::new(script);
        endpoint.gate = Some(gate_rx);
        (endpoint, gate_tx)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl RefreshEndpoint for MockEndpoint {
    async fn refresh(&self) -> Result<String, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            let _opened = gate.wait_for(|open| *open).await.is_ok();
        }
        match &self.script {
            Script::Token(token) => Ok(token.to_owned()),
            Script::Fail => Err(RefreshError::Status(StatusCode::UNAUTHORIZED)),
            Script::Hang => std::future::pending().await,
            Script::Panic => panic!("refresh endpoint blew up"),
        }
    }
}

pub fn coordinator_with(
    store: Arc<CredentialStore>,
    endpoint: MockEndpoint,
    refresh_timeout: Duration,
) -> RefreshCoordinator<MockEndpoint> {
    RefreshCoordinator::new(store, endpoint, refresh_timeout)
}

pub fn pipeline_with(
    addr: SocketAddr,
    store: Arc<CredentialStore>,
    endpoint: MockEndpoint,
) -> RequestPipeline<MockEndpoint> {
    let coordinator = coordinator_with(store, endpoint, Duration::from_secs(5));
    RequestPipeline::new(build_reqwest_client(), &format!("http://{}", addr), coordinator).expect("pipeline")
}

// -------------------------------
// Mock business API
// -------------------------------

/// `/resource` answers 200 only for `Bearer <accepted>`, 401 otherwise.
/// `/public` always answers 200, `/missing` always 404. Every call records
/// the Authorization header it carried.
#[derive(Clone, Default)]
pub struct ApiState {
    pub hits: Arc<AtomicUsize>,
    pub seen_auth: Arc<Mutex<Vec<Option<String>>>>,
    pub accepted: Arc<Mutex<Option<String>>>,
}

impl ApiState {
    pub fn accepting(token: &str) -> Self {
        let state = Self::default();
        *state.accepted.lock().unwrap() = Some(token.to_owned());
        state
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn seen_auth(&self) -> Vec<Option<String>> {
        self.seen_auth.lock().unwrap().clone()
    }

    fn record(&self, headers: &HeaderMap) -> Option<String> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let auth = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_owned());
        self.seen_auth.lock().unwrap().push(auth.clone());
        auth
    }
}

pub fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/resource", get(resource).post(resource))
        .route("/public", get(public))
        .route("/missing", get(missing))
        .with_state(state)
}

async fn resource(State(state): State<ApiState>, headers: HeaderMap) -> (StatusCode, String) {
    let auth = state.record(&headers);
    let expected = state.accepted.lock().unwrap().clone().map(|token| format!("Bearer {}", token));
    match (auth, expected) {
        (Some(auth), Some(expected)) if auth == expected => (StatusCode::OK, r#"{"ok":true}"#.to_owned()),
        _ => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
    }
}

async fn public(State(state): State<ApiState>, headers: HeaderMap) -> (StatusCode, String) {
    state.record(&headers);
    (StatusCode::OK, r#"{"public":true}"#.to_owned())
}

async fn missing(State(state): State<ApiState>, headers: HeaderMap) -> (StatusCode, String) {
    state.record(&headers);
    (StatusCode::NOT_FOUND, "no such thing".to_owned())
}

/// Raw server that answers every connection with `status` and a body shorter
/// than its declared Content-Length, then hangs up.
pub async fn spawn_truncated_body_server(status: StatusCode) -> (JoinHandle<()>, SocketAddr) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: 100\r\nContent-Type: text/plain\r\n\r\nshort",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (handle, addr)
}
