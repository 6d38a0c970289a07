//! Shared fixtures for the integration tests: a host server double and an
//! HTTP peer served by axum.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use remotecluster::{
    LeaderChangedListener, MemoryRemoteClusterStore, RemoteCluster, RemoteClusterConfig,
    RemoteClusterFrame, RemoteClusterService, RemoteClusterStore, Response, ServerIface,
    ServiceConfig,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// === Host server ===

type SharedListener = Arc<dyn Fn() + Send + Sync>;

/// Host server with switchable leadership and an in-memory store.
pub struct TestServer {
    leader: AtomicBool,
    next_id: AtomicUsize,
    listeners: Mutex<HashMap<String, SharedListener>>,
    pub store: Arc<MemoryRemoteClusterStore>,
}

impl TestServer {
    pub fn new(leader: bool) -> Arc<Self> {
        Self::with_remotes(leader, Vec::new())
    }

    pub fn with_remotes(leader: bool, remotes: Vec<RemoteCluster>) -> Arc<Self> {
        Arc::new(Self {
            leader: AtomicBool::new(leader),
            next_id: AtomicUsize::new(0),
            listeners: Mutex::new(HashMap::new()),
            store: Arc::new(MemoryRemoteClusterStore::with_remotes(remotes)),
        })
    }

    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
        let listeners: Vec<SharedListener> =
            self.listeners.lock().unwrap().values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }
}

impl ServerIface for TestServer {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn add_cluster_leader_changed_listener(&self, listener: LeaderChangedListener) -> String {
        let id = format!("leader-listener-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .unwrap()
            .insert(id.clone(), Arc::from(listener));
        id
    }

    fn remove_cluster_leader_changed_listener(&self, listener_id: &str) {
        self.listeners.lock().unwrap().remove(listener_id);
    }

    fn store(&self) -> Arc<dyn RemoteClusterStore> {
        self.store.clone()
    }
}

/// Config with the ping loop off so tests control every request.
pub fn quiet_config() -> ServiceConfig {
    ServiceConfig::new().with_disable_ping(true)
}

// === HTTP peer ===

/// How the peer answers.
#[derive(Debug, Clone)]
pub enum PeerMode {
    /// `{"status": "OK"}`
    Ok,
    /// `{"status": "FAIL", "err": ...}`
    Fail(String),
    /// Bare HTTP status with an empty body.
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub path: &'static str,
    pub frame: RemoteClusterFrame,
    pub remote_id_header: String,
    pub token_header: String,
}

pub struct PeerState {
    mode: Mutex<PeerMode>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    received: Mutex<Vec<ReceivedFrame>>,
    /// When set, frames are dispatched through this service instead.
    service: Mutex<Option<Arc<RemoteClusterService>>>,
}

/// A peer cluster listening on `127.0.0.1` with an ephemeral port.
pub struct MockPeer {
    pub addr: SocketAddr,
    state: Arc<PeerState>,
}

impl MockPeer {
    pub async fn start() -> Self {
        let state = Arc::new(PeerState {
            mode: Mutex::new(PeerMode::Ok),
            delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            service: Mutex::new(None),
        });

        let app = Router::new()
            .route(&route(RemoteClusterConfig::SEND_MSG_URL), post(handle_msg))
            .route(&route(RemoteClusterConfig::PING_URL), post(handle_ping))
            .route(
                &route(RemoteClusterConfig::CONFIRM_INVITE_URL),
                post(handle_confirm_invite),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn site_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A remote record pointing at this peer.
    pub fn remote(&self) -> RemoteCluster {
        let mut rc = RemoteCluster::new("peer", self.site_url());
        rc.remote_token = "peer-token".into();
        rc
    }

    pub fn set_mode(&self, mode: PeerMode) {
        *self.state.mode.lock().unwrap() = mode;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    pub fn forward_to(&self, service: Arc<RemoteClusterService>) {
        *self.state.service.lock().unwrap() = Some(service);
    }

    pub fn received(&self) -> Vec<ReceivedFrame> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn received_on(&self, path: &str) -> usize {
        self.received().iter().filter(|r| r.path == path).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

fn route(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn respond(
    state: Arc<PeerState>,
    path: &'static str,
    headers: HeaderMap,
    frame: RemoteClusterFrame,
) -> axum::response::Response {
    let in_flight = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

    state.received.lock().unwrap().push(ReceivedFrame {
        path,
        frame: frame.clone(),
        remote_id_header: header(&headers, RemoteClusterConfig::HEADER_REMOTE_ID),
        token_header: header(&headers, RemoteClusterConfig::HEADER_REMOTE_TOKEN),
    });

    let delay = *state.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let service = state.service.lock().unwrap().clone();
    let mode = state.mode.lock().unwrap().clone();
    let reply = match service {
        Some(service) => match service.receive_frame(&frame).await {
            Ok(response) => Json(response).into_response(),
            Err(_) => StatusCode::NOT_FOUND.into_response(),
        },
        None => match mode {
            PeerMode::Ok => Json(Response::ok()).into_response(),
            PeerMode::Fail(message) => Json(Response::fail(message)).into_response(),
            PeerMode::Status(code) => StatusCode::from_u16(code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response(),
        },
    };

    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    reply
}

async fn handle_msg(
    State(state): State<Arc<PeerState>>,
    headers: HeaderMap,
    Json(frame): Json<RemoteClusterFrame>,
) -> axum::response::Response {
    respond(state, RemoteClusterConfig::SEND_MSG_URL, headers, frame).await
}

async fn handle_ping(
    State(state): State<Arc<PeerState>>,
    headers: HeaderMap,
    Json(frame): Json<RemoteClusterFrame>,
) -> axum::response::Response {
    respond(state, RemoteClusterConfig::PING_URL, headers, frame).await
}

async fn handle_confirm_invite(
    State(state): State<Arc<PeerState>>,
    headers: HeaderMap,
    Json(frame): Json<RemoteClusterFrame>,
) -> axum::response::Response {
    respond(state, RemoteClusterConfig::CONFIRM_INVITE_URL, headers, frame).await
}
