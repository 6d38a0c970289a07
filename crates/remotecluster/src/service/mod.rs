//! Remote cluster service: lifecycle controller for inter-cluster messaging.
//!
//! The service follows cluster leadership. When this node becomes leader it
//! starts a new pipeline *generation* (send workers, results loop, ping
//! loop), all sharing one [`CancellationToken`]. Losing leadership or
//! shutting down cancels that token, which stops exactly that generation.
//!
//! # Thread Safety
//!
//! `Lifecycle`, the topic registry and the leadership listener handle live
//! behind a single `std::sync::RwLock`. No await point and no listener call
//! happens while it is held.

mod invitation;
mod ping;
mod receive;
mod send;
mod topics;

#[cfg(test)]
pub(crate) mod test_support;

pub use invitation::new_invitation;
pub use send::{SendMsgResultFn, SendOutcome, SendResult, SendStats};
pub use topics::{FnListener, TopicListener};

use crate::config::{RemoteClusterConfig, ServiceConfig};
use crate::error::{RemoteClusterError, Result};
use crate::models::{RemoteCluster, RemoteClusterMsg, Response};
use crate::network::{ConnectivityState, PeerConnectivity, PeerStatus, RemoteClusterClient};
use crate::server::ServerIface;
use send::{SendStatsCounters, SendTask};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use topics::TopicRegistry;
use tracing::debug;

/// One running set of pipelines.
struct Generation {
    id: u64,
    token: CancellationToken,
    send_tx: mpsc::Sender<SendTask>,
}

enum Lifecycle {
    Stopped,
    Running(Generation),
}

/// Everything guarded by the service lock.
struct ServiceState {
    lifecycle: Lifecycle,
    leader_listener_id: Option<String>,
    topics: TopicRegistry,
}

/// Inter-cluster communication via topic based messages.
pub struct RemoteClusterService {
    server: Arc<dyn ServerIface>,
    config: ServiceConfig,
    client: RemoteClusterClient,
    runtime: Handle,
    connectivity: PeerConnectivity,
    stats: SendStatsCounters,
    /// Send workers currently alive, across generations.
    send_workers: AtomicUsize,
    generation_seq: AtomicU64,
    started: AtomicBool,
    state: RwLock<ServiceState>,
}

impl RemoteClusterService {
    /// Create the service. Must be called from within a tokio runtime; the
    /// pipelines are spawned onto that runtime.
    ///
    /// The returned service is paused until [`Self::start`] (or an explicit
    /// [`Self::resume`]).
    pub fn new(server: Arc<dyn ServerIface>, config: ServiceConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let runtime = Handle::try_current().map_err(|e| RemoteClusterError::Config {
            message: format!("remote cluster service requires a tokio runtime: {}", e),
        })?;
        let client = RemoteClusterClient::with_timeout(config.send_timeout)?;

        let service = Arc::new(Self {
            server,
            config,
            client,
            runtime,
            connectivity: PeerConnectivity::new(),
            stats: SendStatsCounters::default(),
            send_workers: AtomicUsize::new(0),
            generation_seq: AtomicU64::new(0),
            started: AtomicBool::new(false),
            state: RwLock::new(ServiceState {
                lifecycle: Lifecycle::Stopped,
                leader_listener_id: None,
                topics: TopicRegistry::new(),
            }),
        });

        service.add_topic_listener(RemoteClusterConfig::PING_TOPIC, Arc::new(ping::PingListener));

        Ok(service)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ServiceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ServiceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // === Lifecycle ===

    /// Subscribe to leadership changes and act on the current leadership.
    ///
    /// A second call without an intervening [`Self::shutdown`] is a no-op.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Remote cluster service already started");
            return Ok(());
        }

        let weak = Arc::downgrade(self);
        let listener_id = self
            .server
            .add_cluster_leader_changed_listener(Box::new(move || {
                if let Some(service) = weak.upgrade() {
                    service.on_cluster_leader_change();
                }
            }));
        self.write_state().leader_listener_id = Some(listener_id);

        self.on_cluster_leader_change();
        Ok(())
    }

    /// Unsubscribe from leadership changes and stop the pipelines.
    ///
    /// Safe to call before `start` or repeatedly.
    pub fn shutdown(&self) -> Result<()> {
        let listener_id = self.write_state().leader_listener_id.take();
        if let Some(id) = listener_id {
            self.server.remove_cluster_leader_changed_listener(&id);
        }
        self.started.store(false, Ordering::SeqCst);
        self.pause();
        Ok(())
    }

    /// Called whenever the cluster leader may have changed.
    pub fn on_cluster_leader_change(self: &Arc<Self>) {
        if self.server.is_leader() {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Start a new pipeline generation unless one is already running.
    pub fn resume(self: &Arc<Self>) {
        let mut state = self.write_state();
        if matches!(state.lifecycle, Lifecycle::Running(_)) {
            return;
        }

        let id = self.generation_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let (send_tx, send_rx) = mpsc::channel(self.config.send_chan_buffer);

        if !self.config.disable_ping {
            self.spawn_ping_loop(id, token.clone());
        }
        self.spawn_send_loop(id, token.clone(), send_rx);

        state.lifecycle = Lifecycle::Running(Generation { id, token, send_tx });
        drop(state);

        debug!(generation = id, "Remote cluster service active");
    }

    /// Cancel the running generation, if any.
    pub fn pause(&self) {
        let mut state = self.write_state();
        let Lifecycle::Running(generation) =
            std::mem::replace(&mut state.lifecycle, Lifecycle::Stopped)
        else {
            return;
        };
        // Only the caller that moved the generation out of `Running` cancels it.
        generation.token.cancel();
        drop(state);

        debug!(generation = generation.id, "Remote cluster service inactive");
    }

    /// Whether a pipeline generation is running.
    pub fn is_active(&self) -> bool {
        matches!(self.read_state().lifecycle, Lifecycle::Running(_))
    }

    /// Id of the running generation.
    pub fn generation(&self) -> Option<u64> {
        match &self.read_state().lifecycle {
            Lifecycle::Running(generation) => Some(generation.id),
            Lifecycle::Stopped => None,
        }
    }

    /// Send workers still alive, including ones of a cancelled generation
    /// that have not exited yet.
    pub fn active_send_workers(&self) -> usize {
        self.send_workers.load(Ordering::SeqCst)
    }

    /// Queue handle of the running generation.
    fn current_sender(&self) -> Option<(mpsc::Sender<SendTask>, CancellationToken)> {
        match &self.read_state().lifecycle {
            Lifecycle::Running(generation) => {
                Some((generation.send_tx.clone(), generation.token.clone()))
            }
            Lifecycle::Stopped => None,
        }
    }

    // === Topic listeners ===

    /// Register a listener for `topic`. Returns its id.
    pub fn add_topic_listener(&self, topic: &str, listener: Arc<dyn TopicListener>) -> String {
        self.write_state().topics.add(topic, listener)
    }

    /// Register a closure for `topic`. Returns its id.
    pub fn add_topic_listener_fn<F>(&self, topic: &str, listener: F) -> String
    where
        F: Fn(&RemoteClusterMsg, &RemoteCluster, &mut Response) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.add_topic_listener(topic, Arc::new(FnListener(listener)))
    }

    /// Remove a listener by id. Unknown ids are ignored.
    pub fn remove_topic_listener(&self, listener_id: &str) {
        self.write_state().topics.remove(listener_id);
    }

    /// Snapshot of the listeners currently bound to `topic`.
    pub(crate) fn topic_listeners(&self, topic: &str) -> Vec<Arc<dyn TopicListener>> {
        self.read_state().topics.listeners(topic)
    }

    /// Number of listeners bound to `topic`.
    pub fn topic_listener_count(&self, topic: &str) -> usize {
        self.read_state().topics.listener_count(topic)
    }

    /// Whether `topic` has a listener bucket.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.read_state().topics.has_topic(topic)
    }

    /// Number of topics with at least one listener.
    pub fn topic_count(&self) -> usize {
        self.read_state().topics.topic_count()
    }

    // === Accessors ===

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Shared HTTP client.
    pub fn client(&self) -> &RemoteClusterClient {
        &self.client
    }

    /// Observed reachability of a remote.
    pub fn connectivity(&self, remote_id: &str) -> ConnectivityState {
        self.connectivity.state(remote_id)
    }

    /// Full connectivity record of a remote, if it was ever pinged.
    pub fn peer_status(&self, remote_id: &str) -> Option<PeerStatus> {
        self.connectivity.status(remote_id)
    }

    /// Outcome counters accumulated by the results loops.
    pub fn send_stats(&self) -> SendStats {
        self.stats.snapshot()
    }
}
