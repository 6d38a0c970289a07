//! Interface the host server provides to the remote cluster service.

use crate::store::RemoteClusterStore;
use std::sync::Arc;

/// Callback invoked whenever cluster leadership may have changed.
pub type LeaderChangedListener = Box<dyn Fn() + Send + Sync + 'static>;

/// Host server collaborator.
///
/// Leader election and persistence live outside this crate; the service only
/// needs to ask who leads, be told when that may have changed, and reach the
/// remote cluster store.
pub trait ServerIface: Send + Sync {
    /// Whether this node currently leads the local cluster.
    fn is_leader(&self) -> bool;

    /// Subscribe to leadership changes. Returns a handle for unsubscribing.
    fn add_cluster_leader_changed_listener(&self, listener: LeaderChangedListener) -> String;

    /// Unsubscribe a listener. Unknown handles are ignored.
    fn remove_cluster_leader_changed_listener(&self, listener_id: &str);

    /// Remote cluster persistence.
    fn store(&self) -> Arc<dyn RemoteClusterStore>;
}
