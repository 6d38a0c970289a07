//! Host server double for service unit tests.

use crate::server::{LeaderChangedListener, ServerIface};
use crate::store::{MemoryRemoteClusterStore, RemoteClusterStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SharedListener = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct MockServer {
    leader: AtomicBool,
    next_id: AtomicUsize,
    listeners: Mutex<HashMap<String, SharedListener>>,
    pub(crate) store: Arc<MemoryRemoteClusterStore>,
}

impl MockServer {
    pub(crate) fn new(leader: bool) -> Arc<Self> {
        Self::with_store(leader, MemoryRemoteClusterStore::new())
    }

    pub(crate) fn with_store(leader: bool, store: MemoryRemoteClusterStore) -> Arc<Self> {
        Arc::new(Self {
            leader: AtomicBool::new(leader),
            next_id: AtomicUsize::new(0),
            listeners: Mutex::new(HashMap::new()),
            store: Arc::new(store),
        })
    }

    /// Flip leadership and notify every subscriber.
    pub(crate) fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
        let listeners: Vec<SharedListener> =
            self.listeners.lock().unwrap().values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl ServerIface for MockServer {
    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }

    fn add_cluster_leader_changed_listener(&self, listener: LeaderChangedListener) -> String {
        let id = format!("listener-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
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

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub(crate) async fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
