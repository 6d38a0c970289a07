//! Topic registry: topic name to independently registered listeners.
//!
//! The registry itself holds no lock. The service keeps it inside its state
//! lock, mutates it only under the write guard, and dispatches from a
//! snapshot taken under the read guard so listeners can (un)register while a
//! message is being delivered.

use crate::error::Result;
use crate::models::{new_id, RemoteCluster, RemoteClusterMsg, Response};
use std::collections::HashMap;
use std::sync::Arc;

/// Receives messages delivered to a topic.
///
/// A listener may write keys into `response`; they travel back to the
/// sending peer. Returning an error marks the whole response failed.
#[async_trait::async_trait]
pub trait TopicListener: Send + Sync {
    async fn handle(
        &self,
        msg: &RemoteClusterMsg,
        rc: &RemoteCluster,
        response: &mut Response,
    ) -> Result<()>;
}

/// Adapter turning a plain closure into a [`TopicListener`].
pub struct FnListener<F>(pub F);

#[async_trait::async_trait]
impl<F> TopicListener for FnListener<F>
where
    F: Fn(&RemoteClusterMsg, &RemoteCluster, &mut Response) -> Result<()> + Send + Sync,
{
    async fn handle(
        &self,
        msg: &RemoteClusterMsg,
        rc: &RemoteCluster,
        response: &mut Response,
    ) -> Result<()> {
        (self.0)(msg, rc, response)
    }
}

struct TopicListenerEntry {
    id: String,
    topic: String,
    listener: Arc<dyn TopicListener>,
}

/// Topic to its listeners, in registration order.
#[derive(Default)]
pub(crate) struct TopicRegistry {
    topics: HashMap<String, Vec<TopicListenerEntry>>,
}

impl TopicRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `topic` and return its id.
    pub(crate) fn add(&mut self, topic: &str, listener: Arc<dyn TopicListener>) -> String {
        let entry = TopicListenerEntry {
            id: new_id(),
            topic: topic.to_string(),
            listener,
        };
        let id = entry.id.clone();
        self.topics.entry(entry.topic.clone()).or_default().push(entry);
        id
    }

    /// Remove a listener by id, pruning its bucket when it empties.
    ///
    /// Returns `false` for unknown ids.
    pub(crate) fn remove(&mut self, listener_id: &str) -> bool {
        let Some(entry) = self.topics.values_mut().find_map(|entries| {
            let index = entries.iter().position(|e| e.id == listener_id)?;
            Some(entries.remove(index))
        }) else {
            return false;
        };

        if self.topics.get(&entry.topic).is_some_and(Vec::is_empty) {
            self.topics.remove(&entry.topic);
        }
        true
    }

    /// Snapshot of the listeners bound to `topic`.
    pub(crate) fn listeners(&self, topic: &str) -> Vec<Arc<dyn TopicListener>> {
        self.topics
            .get(topic)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.listener)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn has_topic(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub(crate) fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub(crate) fn listener_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(Vec::len).unwrap_or(0)
    }
}
