//! Observed reachability of each remote cluster.
//!
//! Updated by the ping pipeline; read by hosts that want to show whether a
//! peer is currently reachable without waiting for the store to catch up.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

/// Peer connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// Last ping succeeded.
    Online,
    /// Last ping failed.
    Offline,
    /// Never pinged by this node.
    Unknown,
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Online => write!(f, "online"),
            ConnectivityState::Offline => write!(f, "offline"),
            ConnectivityState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Connectivity record for one peer.
#[derive(Debug, Clone)]
pub struct PeerStatus {
    pub state: ConnectivityState,
    pub last_success: Option<Instant>,
    pub last_failure: Option<Instant>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl Default for PeerStatus {
    fn default() -> Self {
        Self {
            state: ConnectivityState::Unknown,
            last_success: None,
            last_failure: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Thread-safe map of peer id to [`PeerStatus`].
#[derive(Debug, Default)]
pub struct PeerConnectivity {
    peers: RwLock<HashMap<String, PeerStatus>>,
}

impl PeerConnectivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a peer.
    pub fn state(&self, remote_id: &str) -> ConnectivityState {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(remote_id)
            .map(|s| s.state)
            .unwrap_or(ConnectivityState::Unknown)
    }

    /// Full record of a peer, if it was ever pinged.
    pub fn status(&self, remote_id: &str) -> Option<PeerStatus> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(remote_id)
            .cloned()
    }

    /// Record a successful ping. Returns the previous state.
    pub fn record_success(&self, remote_id: &str) -> ConnectivityState {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        let status = peers.entry(remote_id.to_string()).or_default();
        let previous = status.state;
        status.state = ConnectivityState::Online;
        status.last_success = Some(Instant::now());
        status.consecutive_failures = 0;
        status.last_error = None;
        previous
    }

    /// Record a failed ping. Returns the previous state.
    pub fn record_failure(&self, remote_id: &str, error: impl Into<String>) -> ConnectivityState {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        let status = peers.entry(remote_id.to_string()).or_default();
        let previous = status.state;
        status.state = ConnectivityState::Offline;
        status.last_failure = Some(Instant::now());
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
        status.last_error = Some(error.into());
        previous
    }

    /// Forget peers that are no longer known.
    pub fn retain(&self, known: &[String]) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id, _| known.contains(id));
    }

    /// Number of tracked peers.
    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
