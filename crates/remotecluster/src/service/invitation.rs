//! Accepting a pairing invitation from a peer.

use super::RemoteClusterService;
use crate::config::RemoteClusterConfig;
use crate::error::{RemoteClusterError, Result};
use crate::models::{
    new_id, RemoteCluster, RemoteClusterFrame, RemoteClusterInvite, RemoteClusterMsg,
};
use tracing::{info, warn};

impl RemoteClusterService {
    /// Pair with the peer that issued `invite`.
    ///
    /// The remote is saved before the peer is contacted and removed again if
    /// the confirmation fails, so a failed acceptance leaves no record behind.
    /// Remote failures carry the peer's `Response::error()` text.
    pub async fn accept_invitation(
        &self,
        invite: &RemoteClusterInvite,
        display_name: &str,
        creator_id: &str,
        local_site_url: &str,
    ) -> Result<RemoteCluster> {
        let mut rc = RemoteCluster::new(display_name, invite.site_url.clone());
        rc.remote_id = invite.remote_id.clone();
        rc.remote_token = invite.token.clone();
        rc.creator_id = creator_id.to_string();

        let store = self.server.store();
        let rc = store.save(rc).await?;

        if let Err(e) = self.confirm_invitation(&rc, local_site_url).await {
            warn!(
                remote_id = %rc.remote_id,
                site_url = %rc.site_url,
                error = %e,
                "Invitation confirmation failed"
            );
            if let Err(delete_err) = store.delete(&rc.remote_id).await {
                warn!(
                    remote_id = %rc.remote_id,
                    error = %delete_err,
                    "Failed to remove unconfirmed remote"
                );
            }
            return Err(e);
        }

        info!(
            remote_id = %rc.remote_id,
            site_url = %rc.site_url,
            "Remote cluster invitation accepted"
        );
        Ok(rc)
    }

    async fn confirm_invitation(&self, rc: &RemoteCluster, local_site_url: &str) -> Result<()> {
        let confirm = RemoteClusterInvite {
            remote_id: rc.remote_id.clone(),
            site_url: local_site_url.to_string(),
            token: rc.token.clone(),
        };
        let msg = RemoteClusterMsg::new(
            RemoteClusterConfig::INVITATION_TOPIC,
            serde_json::to_value(&confirm)?,
        );
        let frame = RemoteClusterFrame::new(rc.remote_id.clone(), msg);

        let response = self
            .client
            .send_frame(
                rc,
                RemoteClusterConfig::CONFIRM_INVITE_URL,
                &frame,
                self.config.send_timeout,
            )
            .await?;

        if response.is_success() {
            Ok(())
        } else {
            Err(RemoteClusterError::RemoteFailure {
                message: super::send::remote_failure_message(&response),
            })
        }
    }
}

/// A fresh invitation for a peer to accept, addressed to `site_url`.
pub fn new_invitation(site_url: impl Into<String>) -> RemoteClusterInvite {
    RemoteClusterInvite {
        remote_id: new_id(),
        site_url: site_url.into(),
        token: new_id(),
    }
}
