//! Inbound dispatch of messages received from peers.

use super::RemoteClusterService;
use crate::config::RemoteClusterConfig;
use crate::error::{RemoteClusterError, Result};
use crate::models::{RemoteCluster, RemoteClusterFrame, RemoteClusterMsg, Response};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

impl RemoteClusterService {
    /// Deliver `msg` from `rc` to every listener of its topic.
    ///
    /// Listeners run one after another against a snapshot of the registry, so
    /// a listener may add or remove listeners (itself included) while running.
    /// The first error or panic stops dispatch and produces a failure response.
    /// A topic without listeners yields a plain success.
    pub async fn receive_incoming_msg(
        &self,
        rc: &RemoteCluster,
        msg: &RemoteClusterMsg,
    ) -> Response {
        let listeners = self.topic_listeners(&msg.topic);
        if listeners.is_empty() {
            debug!(remote_id = %rc.remote_id, topic = %msg.topic, "No listeners for topic");
        }

        let mut response = Response::new();
        for listener in listeners {
            let outcome = AssertUnwindSafe(listener.handle(msg, rc, &mut response))
                .catch_unwind()
                .await;

            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(_) => {
                    error!(
                        remote_id = %rc.remote_id,
                        topic = %msg.topic,
                        "Topic listener panicked"
                    );
                    RemoteClusterError::ListenerPanic {
                        topic: msg.topic.clone(),
                    }
                }
            };

            warn!(
                remote_id = %rc.remote_id,
                topic = %msg.topic,
                msg_id = %msg.id,
                error = %err,
                "Topic listener failed"
            );
            response.set_failure(err.to_string());
            return response;
        }

        response.set_status(RemoteClusterConfig::RESPONSE_STATUS_OK);
        response
    }

    /// Resolve the sender of `frame` and dispatch its message.
    ///
    /// Unknown and removed remotes are rejected with
    /// [`RemoteClusterError::RemoteClusterNotFound`].
    pub async fn receive_frame(&self, frame: &RemoteClusterFrame) -> Result<Response> {
        let rc = self
            .server
            .store()
            .get(&frame.remote_id)
            .await?
            .filter(|rc| !rc.is_deleted())
            .ok_or_else(|| RemoteClusterError::RemoteClusterNotFound {
                remote_id: frame.remote_id.clone(),
            })?;

        Ok(self.receive_incoming_msg(&rc, &frame.msg).await)
    }
}
