//! Send pipeline: bounded queue, fixed worker pool, results loop.
//!
//! Each generation owns its own queue. Submissions go to the running
//! generation only; once it is cancelled, queued tasks are abandoned and never
//! replayed by a later generation. Tasks already in flight run to completion
//! and report their outcome, unless they are still running when the drain
//! deadline passes.

use super::RemoteClusterService;
use crate::config::RemoteClusterConfig;
use crate::error::{RemoteClusterError, Result};
use crate::models::{RemoteCluster, RemoteClusterFrame, RemoteClusterMsg, Response};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Completion callback of a send. Invoked exactly once, from the worker
/// that executed the task.
pub type SendMsgResultFn =
    Box<dyn FnOnce(&RemoteClusterMsg, &RemoteCluster, &SendOutcome) + Send + 'static>;

/// One queued delivery attempt.
pub(crate) struct SendTask {
    rc: RemoteCluster,
    msg: RemoteClusterMsg,
    callback: Option<SendMsgResultFn>,
    deadline: Instant,
}

/// Final state of a send.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The peer answered with a success response.
    Succeeded(Response),
    /// Connection failure, non-2xx status or undecodable body.
    FailedTransport(String),
    /// The peer answered with a non-success response.
    FailedRemote(Response),
    /// The send timeout elapsed.
    TimedOut(Duration),
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Succeeded(_))
    }

    /// Peer response, when one was received.
    pub fn response(&self) -> Option<&Response> {
        match self {
            SendOutcome::Succeeded(response) | SendOutcome::FailedRemote(response) => {
                Some(response)
            }
            _ => None,
        }
    }

    /// Human readable error, `None` on success.
    pub fn error(&self) -> Option<String> {
        match self {
            SendOutcome::Succeeded(_) => None,
            SendOutcome::FailedTransport(message) => Some(message.clone()),
            SendOutcome::FailedRemote(response) => Some(remote_failure_message(response)),
            SendOutcome::TimedOut(timeout) => Some(format!("send timed out after {:?}", timeout)),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SendOutcome::Succeeded(_) => "succeeded",
            SendOutcome::FailedTransport(_) => "failed-transport",
            SendOutcome::FailedRemote(_) => "failed-remote",
            SendOutcome::TimedOut(_) => "timed-out",
        }
    }

    /// Convert into a `Result`, keeping the peer response on success.
    pub fn into_result(self) -> Result<Response> {
        match self {
            SendOutcome::Succeeded(response) => Ok(response),
            SendOutcome::FailedTransport(message) => Err(RemoteClusterError::Network {
                message,
                cause: None,
            }),
            SendOutcome::FailedRemote(response) => Err(RemoteClusterError::RemoteFailure {
                message: remote_failure_message(&response),
            }),
            SendOutcome::TimedOut(timeout) => Err(RemoteClusterError::Timeout(timeout)),
        }
    }

    fn from_response(response: Response) -> Self {
        if response.is_success() {
            SendOutcome::Succeeded(response)
        } else {
            SendOutcome::FailedRemote(response)
        }
    }
}

/// `Response::error()` verbatim, or the raw status for non-standard replies.
pub(super) fn remote_failure_message(response: &Response) -> String {
    let message = response.error();
    if message.is_empty() {
        format!(
            "unexpected response status {:?}",
            response.string(RemoteClusterConfig::RESPONSE_STATUS_KEY)
        )
    } else {
        message
    }
}

/// Record pushed onto the results queue for every executed task.
#[derive(Debug, Clone)]
pub struct SendResult {
    pub generation: u64,
    pub remote_id: String,
    pub msg_id: String,
    pub topic: String,
    pub outcome: SendOutcome,
    pub elapsed: Duration,
}

/// Outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub succeeded: u64,
    pub failed_transport: u64,
    pub failed_remote: u64,
    pub timed_out: u64,
}

impl SendStats {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed_transport + self.failed_remote + self.timed_out
    }
}

#[derive(Debug, Default)]
pub(crate) struct SendStatsCounters {
    succeeded: AtomicU64,
    failed_transport: AtomicU64,
    failed_remote: AtomicU64,
    timed_out: AtomicU64,
}

impl SendStatsCounters {
    fn record(&self, outcome: &SendOutcome) {
        let counter = match outcome {
            SendOutcome::Succeeded(_) => &self.succeeded,
            SendOutcome::FailedTransport(_) => &self.failed_transport,
            SendOutcome::FailedRemote(_) => &self.failed_remote,
            SendOutcome::TimedOut(_) => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SendStats {
        SendStats {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed_transport: self.failed_transport.load(Ordering::Relaxed),
            failed_remote: self.failed_remote.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Decrements the live worker count when a worker exits, however it exits.
struct WorkerGuard(Arc<RemoteClusterService>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.send_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<SendTask>>>;

impl RemoteClusterService {
    /// Queue `msg` for delivery to `rc`.
    ///
    /// Waits while the queue is full. Fails with
    /// [`RemoteClusterError::ServiceInactive`] when no generation is running
    /// (or it stops while waiting); such a message is never delivered.
    /// Transport and remote failures are reported to `callback` only.
    pub async fn send_msg(
        &self,
        msg: RemoteClusterMsg,
        rc: RemoteCluster,
        callback: Option<SendMsgResultFn>,
    ) -> Result<()> {
        let Some((send_tx, token)) = self.current_sender() else {
            debug!(
                remote_id = %rc.remote_id,
                topic = %msg.topic,
                "Send rejected: service inactive"
            );
            return Err(RemoteClusterError::ServiceInactive);
        };

        let task = SendTask {
            rc,
            msg,
            callback,
            deadline: Instant::now() + self.config.send_timeout,
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(RemoteClusterError::ServiceInactive),
            sent = send_tx.send(task) => sent.map_err(|_| RemoteClusterError::ServiceInactive),
        }
    }

    /// Queue `msg` and wait for its outcome.
    ///
    /// Returns [`RemoteClusterError::Cancelled`] if the generation stopped
    /// before the task started, or the task was still in flight at the drain
    /// deadline.
    pub async fn send_msg_and_wait(
        &self,
        msg: RemoteClusterMsg,
        rc: RemoteCluster,
    ) -> Result<SendOutcome> {
        let (tx, rx) = oneshot::channel();
        let callback: SendMsgResultFn = Box::new(
            move |_: &RemoteClusterMsg, _: &RemoteCluster, outcome: &SendOutcome| {
                let _ = tx.send(outcome.clone());
            },
        );

        self.send_msg(msg, rc, Some(callback)).await?;
        rx.await.map_err(|_| RemoteClusterError::Cancelled)
    }

    /// Spawn the workers and the results loop of one generation.
    pub(super) fn spawn_send_loop(
        self: &Arc<Self>,
        generation: u64,
        token: CancellationToken,
        send_rx: mpsc::Receiver<SendTask>,
    ) {
        let (results_tx, results_rx) = mpsc::channel(self.config.results_chan_buffer);
        let send_rx: SharedReceiver = Arc::new(Mutex::new(send_rx));

        for worker in 0..self.config.max_concurrent_sends {
            self.send_workers.fetch_add(1, Ordering::SeqCst);
            let guard = WorkerGuard(Arc::clone(self));
            self.runtime.spawn(Arc::clone(self).send_worker(
                guard,
                generation,
                worker,
                token.clone(),
                Arc::clone(&send_rx),
                results_tx.clone(),
            ));
        }

        self.runtime
            .spawn(Arc::clone(self).results_loop(generation, token, results_rx));
    }

    async fn send_worker(
        self: Arc<Self>,
        _guard: WorkerGuard,
        generation: u64,
        worker: usize,
        token: CancellationToken,
        send_rx: SharedReceiver,
        results_tx: mpsc::Sender<SendResult>,
    ) {
        debug!(generation, worker, "Send worker started");

        loop {
            let task = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                task = async { send_rx.lock().await.recv().await } => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let started = Instant::now();
            let outcome = tokio::select! {
                outcome = self.execute_send(&task.rc, &task.msg, task.deadline) => outcome,
                _ = self.drain_deadline(&token) => {
                    debug!(
                        generation,
                        remote_id = %task.rc.remote_id,
                        msg_id = %task.msg.id,
                        "Discarding send still in flight at the drain deadline"
                    );
                    break;
                }
            };

            self.finish_task(generation, task, outcome, started.elapsed(), &results_tx)
                .await;
        }

        debug!(generation, worker, "Send worker stopped");
    }

    /// Resolves `result_queue_drain_timeout` after `token` is cancelled.
    async fn drain_deadline(&self, token: &CancellationToken) {
        token.cancelled().await;
        tokio::time::sleep(self.config.result_queue_drain_timeout).await;
    }

    /// Perform the HTTP call of one task.
    ///
    /// Takes the task's parts rather than the task: the callback is not
    /// `Sync`, so the task itself cannot be borrowed across an await.
    async fn execute_send(
        &self,
        rc: &RemoteCluster,
        msg: &RemoteClusterMsg,
        deadline: Instant,
    ) -> SendOutcome {
        let now = Instant::now();
        if now >= deadline {
            return SendOutcome::TimedOut(self.config.send_timeout);
        }
        let remaining = deadline - now;

        let frame = RemoteClusterFrame::new(rc.remote_id.clone(), msg.clone());
        match self
            .client
            .send_frame(rc, RemoteClusterConfig::SEND_MSG_URL, &frame, remaining)
            .await
        {
            Ok(response) => SendOutcome::from_response(response),
            Err(RemoteClusterError::Timeout(_)) => SendOutcome::TimedOut(self.config.send_timeout),
            Err(e) => SendOutcome::FailedTransport(e.to_string()),
        }
    }

    /// Report an outcome to the task's callback and the results queue.
    async fn finish_task(
        &self,
        generation: u64,
        task: SendTask,
        outcome: SendOutcome,
        elapsed: Duration,
        results_tx: &mpsc::Sender<SendResult>,
    ) {
        let SendTask {
            rc, msg, callback, ..
        } = task;

        if let Some(callback) = callback {
            let call = AssertUnwindSafe(|| callback(&msg, &rc, &outcome));
            if std::panic::catch_unwind(call).is_err() {
                error!(remote_id = %rc.remote_id, msg_id = %msg.id, "Send callback panicked");
            }
        }

        let result = SendResult {
            generation,
            remote_id: rc.remote_id,
            msg_id: msg.id,
            topic: msg.topic,
            outcome,
            elapsed,
        };
        if results_tx.send(result).await.is_err() {
            debug!(generation, "Results queue closed; dropping send result");
        }
    }

    async fn results_loop(
        self: Arc<Self>,
        generation: u64,
        token: CancellationToken,
        mut results_rx: mpsc::Receiver<SendResult>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = results_rx.recv() => match result {
                    Some(result) => self.record_result(&result),
                    None => return,
                },
            }
        }

        let drain = async {
            while let Some(result) = results_rx.recv().await {
                self.record_result(&result);
            }
        };
        if tokio::time::timeout(self.config.result_queue_drain_timeout, drain)
            .await
            .is_err()
        {
            warn!(generation, "Results queue drain deadline reached; discarding remaining results");
        }
    }

    fn record_result(&self, result: &SendResult) {
        self.stats.record(&result.outcome);

        match &result.outcome {
            SendOutcome::Succeeded(_) => debug!(
                generation = result.generation,
                remote_id = %result.remote_id,
                msg_id = %result.msg_id,
                topic = %result.topic,
                elapsed = ?result.elapsed,
                "Remote cluster message sent"
            ),
            outcome => warn!(
                generation = result.generation,
                remote_id = %result.remote_id,
                msg_id = %result.msg_id,
                topic = %result.topic,
                outcome = outcome.kind(),
                error = %outcome.error().unwrap_or_default(),
                "Remote cluster message failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::MockServer;
    use super::*;
    use crate::config::ServiceConfig;
    use serde_json::json;

    fn response(value: serde_json::Value) -> Response {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_outcome_classification() {
        let ok = SendOutcome::from_response(response(json!({"status": "OK"})));
        assert!(ok.is_success());
        assert_eq!(ok.kind(), "succeeded");
        assert!(ok.error().is_none());

        let fail = SendOutcome::from_response(response(json!({"status": "FAIL", "err": "x"})));
        assert_eq!(fail.kind(), "failed-remote");
        assert_eq!(fail.error().as_deref(), Some("FAIL: x"));
        assert!(matches!(
            fail.into_result(),
            Err(RemoteClusterError::RemoteFailure { message }) if message == "FAIL: x"
        ));

        let odd = SendOutcome::from_response(response(json!({"status": "MAYBE"})));
        assert_eq!(odd.kind(), "failed-remote");
        assert_eq!(odd.error().as_deref(), Some("unexpected response status \"MAYBE\""));
    }

    #[test]
    fn test_timeout_outcome_into_result() {
        let outcome = SendOutcome::TimedOut(Duration::from_secs(1));
        assert!(outcome.response().is_none());
        assert!(matches!(outcome.into_result(), Err(RemoteClusterError::Timeout(_))));
    }

    #[test]
    fn test_stats_counters() {
        let counters = SendStatsCounters::default();
        counters.record(&SendOutcome::Succeeded(Response::ok()));
        counters.record(&SendOutcome::TimedOut(Duration::from_secs(1)));
        counters.record(&SendOutcome::FailedTransport("refused".into()));

        let stats = counters.snapshot();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.failed_transport, 1);
        assert_eq!(stats.total(), 3);
    }

    #[tokio::test]
    async fn test_send_while_paused_is_rejected() {
        let server = MockServer::new(false);
        let config = ServiceConfig::new().with_disable_ping(true);
        let service = RemoteClusterService::new(server, config).unwrap();
        let rc = RemoteCluster::new("peer", "http://127.0.0.1:1");

        let err = service
            .send_msg(RemoteClusterMsg::new("posts", json!({})), rc, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteClusterError::ServiceInactive));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_failed_transport() {
        let server = MockServer::new(true);
        let config = ServiceConfig::new()
            .with_disable_ping(true)
            .with_send_timeout(Duration::from_secs(5));
        let service = RemoteClusterService::new(server, config).unwrap();
        service.resume();

        let rc = RemoteCluster::new("peer", "http://127.0.0.1:1");
        let outcome = service
            .send_msg_and_wait(RemoteClusterMsg::new("posts", json!({})), rc)
            .await
            .unwrap();
        assert_eq!(outcome.kind(), "failed-transport");

        service.pause();
    }

    #[tokio::test]
    async fn test_blocked_submitter_released_on_pause() {
        let server = MockServer::new(true);
        let config = ServiceConfig::new()
            .with_disable_ping(true)
            .with_send_chan_buffer(1)
            .with_max_concurrent_sends(1)
            .with_send_timeout(Duration::from_secs(30));
        let service = RemoteClusterService::new(server, config).unwrap();
        service.resume();

        // A listener that never accepts keeps the single worker waiting.
        let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let rc = RemoteCluster::new("peer", format!("http://{}", silent.local_addr().unwrap()));
        for _ in 0..2 {
            let _ = tokio::time::timeout(
                Duration::from_millis(200),
                service.send_msg(RemoteClusterMsg::new("posts", json!({})), rc.clone(), None),
            )
            .await;
        }

        let blocked = {
            let service = Arc::clone(&service);
            let rc = rc.clone();
            tokio::spawn(async move {
                service
                    .send_msg(RemoteClusterMsg::new("posts", json!({})), rc, None)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        service.pause();

        let result = tokio::time::timeout(Duration::from_secs(2), blocked)
            .await
            .expect("submitter should be released")
            .unwrap();
        assert!(matches!(result, Err(RemoteClusterError::ServiceInactive)));
    }
}
