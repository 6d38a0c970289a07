//! Remote cluster records and pairing invitations.

use super::{get_millis, new_id};
use crate::config::RemoteClusterConfig;
use serde::{Deserialize, Serialize};

/// A peer server instance this node exchanges messages with.
///
/// Owned by the persistence collaborator. The service only reads it to
/// address outbound calls, and reports ping results through
/// [`crate::store::RemoteClusterStore::set_last_ping_at`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCluster {
    /// Id of the remote as known locally.
    pub remote_id: String,
    pub display_name: String,
    /// Base URL of the peer, e.g. `https://chat.example.com`.
    pub site_url: String,
    /// Token the peer must present when calling us.
    pub token: String,
    /// Token we present when calling the peer.
    pub remote_token: String,
    pub create_at: i64,
    /// Removal time; 0 while the remote is active.
    #[serde(default)]
    pub delete_at: i64,
    /// Last successful ping, 0 if never.
    #[serde(default)]
    pub last_ping_at: i64,
    #[serde(default)]
    pub creator_id: String,
}

impl RemoteCluster {
    /// Create a remote with fresh id and local token.
    pub fn new(display_name: impl Into<String>, site_url: impl Into<String>) -> Self {
        Self {
            remote_id: new_id(),
            display_name: display_name.into(),
            site_url: site_url.into(),
            token: new_id(),
            create_at: get_millis(),
            ..Default::default()
        }
    }

    /// Whether the remote has been removed.
    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }

    /// Whether the remote is addressable by the ping/send pipelines.
    pub fn is_reachable_target(&self) -> bool {
        !self.is_deleted() && !self.site_url.trim().is_empty()
    }

    /// Online if a ping succeeded within [`RemoteClusterConfig::OFFLINE_AFTER`].
    pub fn is_online(&self) -> bool {
        self.is_online_at(get_millis())
    }

    /// [`Self::is_online`] evaluated at an explicit time.
    pub fn is_online_at(&self, now_millis: i64) -> bool {
        let window = RemoteClusterConfig::OFFLINE_AFTER.as_millis() as i64;
        self.last_ping_at > 0 && self.last_ping_at > now_millis - window
    }
}

/// Invitation used to pair this node with an inviting peer.
///
/// The inviting peer rejects confirmations received more than
/// [`RemoteClusterConfig::INVITE_EXPIRES_AFTER`] after it issued the invite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteClusterInvite {
    /// Id the inviting peer assigned to us.
    pub remote_id: String,
    pub site_url: String,
    pub token: String,
}
