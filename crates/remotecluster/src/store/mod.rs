//! Persistence collaborator for remote cluster records.
//!
//! The service never owns remote cluster storage. Hosts plug in their own
//! backend through [`RemoteClusterStore`]; [`MemoryRemoteClusterStore`] is a
//! process-local implementation for embedding and tests.

mod memory;

pub use memory::MemoryRemoteClusterStore;

use crate::error::Result;
use crate::models::RemoteCluster;

/// Storage backend for [`RemoteCluster`] records.
#[async_trait::async_trait]
pub trait RemoteClusterStore: Send + Sync {
    /// Get a remote by id, including removed ones.
    async fn get(&self, remote_id: &str) -> Result<Option<RemoteCluster>>;

    /// List every remote that has not been removed.
    async fn get_all(&self) -> Result<Vec<RemoteCluster>>;

    /// Insert or replace a remote.
    async fn save(&self, rc: RemoteCluster) -> Result<RemoteCluster>;

    /// Delete a remote. Returns `false` if it did not exist.
    async fn delete(&self, remote_id: &str) -> Result<bool>;

    /// Record a successful ping.
    async fn set_last_ping_at(&self, remote_id: &str, ping_at: i64) -> Result<()>;
}
