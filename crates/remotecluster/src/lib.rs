//! Remote Cluster - leader-gated message bus between peer server instances.
//!
//! This crate lets a server exchange topic-addressed messages with remote
//! clusters over HTTP. Only the elected leader of the local cluster drives
//! outbound traffic: the service watches leadership and starts or stops its
//! send and ping pipelines as leadership flips.
//!
//! Leader election, persistence and the inbound HTTP routes belong to the
//! host, which plugs in through [`server::ServerIface`] and
//! [`store::RemoteClusterStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use remotecluster::{RemoteClusterMsg, RemoteClusterService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> remotecluster::Result<()> {
//!     let service = RemoteClusterService::new(server, ServiceConfig::default())?;
//!     service.add_topic_listener_fn("posts", |msg, rc, _response| {
//!         println!("{} sent {}", rc.display_name, msg.id);
//!         Ok(())
//!     });
//!     service.start()?;
//!
//!     let msg = RemoteClusterMsg::new("posts", serde_json::json!({"text": "hi"}));
//!     let outcome = service.send_msg_and_wait(msg, remote).await?;
//!     println!("delivered: {}", outcome.is_success());
//!
//!     service.shutdown()
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod server;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use config::{RemoteClusterConfig, ServiceConfig, TransportConfig};
pub use error::{RemoteClusterError, Result};
pub use models::{
    RemoteCluster, RemoteClusterFrame, RemoteClusterInvite, RemoteClusterMsg, RemotePingMsg,
    Response,
};
pub use network::{ConnectivityState, PeerStatus, RemoteClusterClient};
pub use server::{LeaderChangedListener, ServerIface};
pub use service::{
    new_invitation, FnListener, RemoteClusterService, SendMsgResultFn, SendOutcome, SendResult,
    SendStats, TopicListener,
};
pub use store::{MemoryRemoteClusterStore, RemoteClusterStore};
