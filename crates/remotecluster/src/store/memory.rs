//! In-memory remote cluster store.

use super::RemoteClusterStore;
use crate::error::{RemoteClusterError, Result};
use crate::models::RemoteCluster;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// [`RemoteClusterStore`] backed by a map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRemoteClusterStore {
    remotes: RwLock<HashMap<String, RemoteCluster>>,
}

impl MemoryRemoteClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `remotes`.
    pub fn with_remotes(remotes: impl IntoIterator<Item = RemoteCluster>) -> Self {
        Self {
            remotes: RwLock::new(
                remotes
                    .into_iter()
                    .map(|rc| (rc.remote_id.clone(), rc))
                    .collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl RemoteClusterStore for MemoryRemoteClusterStore {
    async fn get(&self, remote_id: &str) -> Result<Option<RemoteCluster>> {
        Ok(self.remotes.read().await.get(remote_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<RemoteCluster>> {
        let mut remotes: Vec<_> = self
            .remotes
            .read()
            .await
            .values()
            .filter(|rc| !rc.is_deleted())
            .cloned()
            .collect();
        remotes.sort_by_key(|rc| rc.create_at);
        Ok(remotes)
    }

    async fn save(&self, rc: RemoteCluster) -> Result<RemoteCluster> {
        if rc.remote_id.is_empty() {
            return Err(RemoteClusterError::store("remote_id is required"));
        }
        self.remotes
            .write()
            .await
            .insert(rc.remote_id.clone(), rc.clone());
        Ok(rc)
    }

    async fn delete(&self, remote_id: &str) -> Result<bool> {
        Ok(self.remotes.write().await.remove(remote_id).is_some())
    }

    async fn set_last_ping_at(&self, remote_id: &str, ping_at: i64) -> Result<()> {
        let mut remotes = self.remotes.write().await;
        let rc = remotes
            .get_mut(remote_id)
            .ok_or_else(|| RemoteClusterError::RemoteClusterNotFound {
                remote_id: remote_id.to_string(),
            })?;
        rc.last_ping_at = ping_at;
        Ok(())
    }
}
