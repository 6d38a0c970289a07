//! Topic messages and the frame they travel in.

use super::{get_millis, new_id};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A topic-addressed message with an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteClusterMsg {
    pub id: String,
    pub topic: String,
    pub create_at: i64,
    #[serde(default)]
    pub payload: Value,
}

impl RemoteClusterMsg {
    /// Create a message with a fresh id.
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: new_id(),
            topic: topic.into(),
            create_at: get_millis(),
            payload,
        }
    }
}

/// Body of every request sent to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteClusterFrame {
    /// Id under which the receiver knows the sender.
    pub remote_id: String,
    pub msg: RemoteClusterMsg,
}

impl RemoteClusterFrame {
    pub fn new(remote_id: impl Into<String>, msg: RemoteClusterMsg) -> Self {
        Self {
            remote_id: remote_id.into(),
            msg,
        }
    }
}

/// Payload of a `ping` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePingMsg {
    pub id: String,
    pub sent_at: i64,
    #[serde(default)]
    pub recv_at: i64,
}

impl RemotePingMsg {
    /// A ping stamped with the current time.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            sent_at: get_millis(),
            recv_at: 0,
        }
    }
}
