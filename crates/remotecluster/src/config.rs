//! Centralized configuration for the remote cluster service.
//!
//! [`RemoteClusterConfig`] holds the protocol constants shared with peers.
//! [`ServiceConfig`] holds the runtime knobs a host (or a test) may tune; its
//! defaults come from the constants.

use std::time::Duration;

/// Protocol constants for inter-cluster messaging.
pub struct RemoteClusterConfig;

impl RemoteClusterConfig {
    // Queue capacities
    pub const SEND_CHAN_BUFFER: usize = 50;
    pub const RESULTS_CHAN_BUFFER: usize = 50;
    pub const RESULT_QUEUE_DRAIN_TIMEOUT: Duration = Duration::from_millis(10_000);

    // Send pipeline
    pub const MAX_CONCURRENT_SENDS: usize = 5;
    pub const SEND_TIMEOUT: Duration = Duration::from_secs(60);

    // Ping pipeline
    pub const PING_FREQ: Duration = Duration::from_secs(60);
    pub const PING_TIMEOUT: Duration = Duration::from_secs(15);

    // Endpoints, relative to a peer's site URL
    pub const SEND_MSG_URL: &'static str = "api/v4/remotecluster/msg";
    pub const PING_URL: &'static str = "api/v4/remotecluster/ping";
    pub const CONFIRM_INVITE_URL: &'static str = "api/v4/remotecluster/confirm_invite";

    // Reserved topics
    pub const INVITATION_TOPIC: &'static str = "invitation";
    pub const PING_TOPIC: &'static str = "ping";

    // Response envelope
    pub const RESPONSE_STATUS_KEY: &'static str = "status";
    pub const RESPONSE_ERROR_KEY: &'static str = "err";
    pub const RESPONSE_STATUS_OK: &'static str = "OK";
    pub const RESPONSE_STATUS_FAIL: &'static str = "FAIL";

    // Request headers
    pub const HEADER_REMOTE_ID: &'static str = "X-RemoteCluster-Id";
    pub const HEADER_REMOTE_TOKEN: &'static str = "X-RemoteCluster-Token";

    /// Invitations are rejected by the inviting peer after this window.
    pub const INVITE_EXPIRES_AFTER: Duration = Duration::from_secs(48 * 3600);

    /// A peer with no successful ping within this window is considered offline.
    pub const OFFLINE_AFTER: Duration = Duration::from_secs(2 * 60);
}

/// Transport tuning for the shared HTTP client.
pub struct TransportConfig;

impl TransportConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
    pub const MAX_IDLE_CONNS_PER_HOST: usize = 2;
    pub const USER_AGENT: &'static str = concat!("remotecluster/", env!("CARGO_PKG_VERSION"));
}

/// Runtime configuration for a [`crate::RemoteClusterService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Capacity of each generation's send queue.
    pub send_chan_buffer: usize,
    /// Capacity of each generation's results queue.
    pub results_chan_buffer: usize,
    /// Number of send workers per generation.
    pub max_concurrent_sends: usize,
    /// Bound on a single send (and on the shared client's requests).
    pub send_timeout: Duration,
    /// Delay between ping rounds.
    pub ping_freq: Duration,
    /// Bound on a single ping.
    pub ping_timeout: Duration,
    /// How long the results loop keeps draining after cancellation.
    pub result_queue_drain_timeout: Duration,
    /// Skip the ping pipeline entirely.
    pub disable_ping: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            send_chan_buffer: RemoteClusterConfig::SEND_CHAN_BUFFER,
            results_chan_buffer: RemoteClusterConfig::RESULTS_CHAN_BUFFER,
            max_concurrent_sends: RemoteClusterConfig::MAX_CONCURRENT_SENDS,
            send_timeout: RemoteClusterConfig::SEND_TIMEOUT,
            ping_freq: RemoteClusterConfig::PING_FREQ,
            ping_timeout: RemoteClusterConfig::PING_TIMEOUT,
            result_queue_drain_timeout: RemoteClusterConfig::RESULT_QUEUE_DRAIN_TIMEOUT,
            disable_ping: false,
        }
    }
}

impl ServiceConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the send queue capacity.
    pub fn with_send_chan_buffer(mut self, capacity: usize) -> Self {
        self.send_chan_buffer = capacity;
        self
    }

    /// Set the results queue capacity.
    pub fn with_results_chan_buffer(mut self, capacity: usize) -> Self {
        self.results_chan_buffer = capacity;
        self
    }

    /// Set the number of send workers.
    pub fn with_max_concurrent_sends(mut self, workers: usize) -> Self {
        self.max_concurrent_sends = workers;
        self
    }

    /// Set the send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the ping period.
    pub fn with_ping_freq(mut self, freq: Duration) -> Self {
        self.ping_freq = freq;
        self
    }

    /// Set the ping timeout.
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Set the results drain deadline.
    pub fn with_result_queue_drain_timeout(mut self, timeout: Duration) -> Self {
        self.result_queue_drain_timeout = timeout;
        self
    }

    /// Enable or disable the ping pipeline.
    pub fn with_disable_ping(mut self, disable: bool) -> Self {
        self.disable_ping = disable;
        self
    }

    /// Reject configurations the pipelines cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |field: &str| crate::RemoteClusterError::Config {
            message: format!("{} must be greater than zero", field),
        };

        if self.send_chan_buffer == 0 {
            return Err(invalid("send_chan_buffer"));
        }
        if self.results_chan_buffer == 0 {
            return Err(invalid("results_chan_buffer"));
        }
        if self.max_concurrent_sends == 0 {
            return Err(invalid("max_concurrent_sends"));
        }
        if self.send_timeout.is_zero() {
            return Err(invalid("send_timeout"));
        }
        if self.ping_freq.is_zero() {
            return Err(invalid("ping_freq"));
        }
        Ok(())
    }
}
