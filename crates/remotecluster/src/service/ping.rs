//! Liveness pings to every known remote.

use super::{RemoteClusterService, TopicListener};
use crate::config::RemoteClusterConfig;
use crate::error::{RemoteClusterError, Result};
use crate::models::{
    get_millis, RemoteCluster, RemoteClusterFrame, RemoteClusterMsg, RemotePingMsg, Response,
};
use crate::network::ConnectivityState;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Answers pings from peers by stamping the receive time.
pub(crate) struct PingListener;

#[async_trait::async_trait]
impl TopicListener for PingListener {
    async fn handle(
        &self,
        msg: &RemoteClusterMsg,
        rc: &RemoteCluster,
        response: &mut Response,
    ) -> Result<()> {
        let mut ping: RemotePingMsg = serde_json::from_value(msg.payload.clone())?;
        ping.recv_at = get_millis();
        debug!(remote_id = %rc.remote_id, ping_id = %ping.id, "Ping received");

        response.set("id", ping.id);
        response.set("recv_at", ping.recv_at);
        Ok(())
    }
}

impl RemoteClusterService {
    pub(super) fn spawn_ping_loop(self: &Arc<Self>, generation: u64, token: CancellationToken) {
        let service = Arc::clone(self);
        self.runtime.spawn(async move {
            debug!(generation, "Ping loop started");
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = service.ping_all_now() => {}
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(service.config.ping_freq) => {}
                }
            }
            debug!(generation, "Ping loop stopped");
        });
    }

    /// Ping every addressable remote concurrently.
    ///
    /// Returns how many remotes answered.
    pub async fn ping_all_now(&self) -> usize {
        let remotes = match self.server.store().get_all().await {
            Ok(remotes) => remotes,
            Err(e) => {
                warn!(error = %e, "Failed to load remote clusters for ping");
                return 0;
            }
        };

        let targets: Vec<RemoteCluster> = remotes
            .into_iter()
            .filter(RemoteCluster::is_reachable_target)
            .collect();
        let known: Vec<String> = targets.iter().map(|rc| rc.remote_id.clone()).collect();
        self.connectivity.retain(&known);

        join_all(targets.iter().map(|rc| self.ping_now(rc)))
            .await
            .into_iter()
            .filter(Result::is_ok)
            .count()
    }

    /// Ping one remote and record the result.
    pub async fn ping_now(&self, rc: &RemoteCluster) -> Result<RemotePingMsg> {
        match self.send_ping(rc).await {
            Ok(ping) => {
                let now = get_millis();
                if let Err(e) = self.server.store().set_last_ping_at(&rc.remote_id, now).await {
                    warn!(remote_id = %rc.remote_id, error = %e, "Failed to record ping time");
                }
                if self.connectivity.record_success(&rc.remote_id) == ConnectivityState::Offline {
                    info!(
                        remote_id = %rc.remote_id,
                        site_url = %rc.site_url,
                        "Remote cluster back online"
                    );
                }
                Ok(ping)
            }
            Err(e) => {
                let previous = self.connectivity.record_failure(&rc.remote_id, e.to_string());
                if previous != ConnectivityState::Offline {
                    warn!(
                        remote_id = %rc.remote_id,
                        site_url = %rc.site_url,
                        error = %e,
                        "Remote cluster offline"
                    );
                } else {
                    debug!(remote_id = %rc.remote_id, error = %e, "Ping failed");
                }
                Err(e)
            }
        }
    }

    async fn send_ping(&self, rc: &RemoteCluster) -> Result<RemotePingMsg> {
        let mut ping = RemotePingMsg::new();
        let msg =
            RemoteClusterMsg::new(RemoteClusterConfig::PING_TOPIC, serde_json::to_value(&ping)?);
        let frame = RemoteClusterFrame::new(rc.remote_id.clone(), msg);

        let response = self
            .client
            .send_frame(rc, RemoteClusterConfig::PING_URL, &frame, self.config.ping_timeout)
            .await?;
        if !response.is_success() {
            return Err(RemoteClusterError::RemoteFailure {
                message: super::send::remote_failure_message(&response),
            });
        }

        ping.recv_at = response
            .get("recv_at")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or_default();
        Ok(ping)
    }
}
