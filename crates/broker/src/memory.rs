use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    futures::StreamExt,
    tokio::sync::broadcast,
    tokio_stream::wrappers::BroadcastStream,
};

use crate::{BrokerTransport, Error, MessageStream, Result};

const DEFAULT_CAPACITY: usize = 1024;

/// In-process pub/sub bus with the same fan-out, fire-and-forget semantics
/// as Redis pub/sub.
///
/// Publishing to a topic nobody listens on succeeds and the payload is lost.
/// A receiver that falls more than `capacity` messages behind gets a
/// transient receive error and resumes from the oldest retained message.
#[derive(Clone)]
pub struct MemoryTransport {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
    capacity: usize,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of open subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).map_or(0, broadcast::Sender::receiver_count)
    }

    /// Drop the topic so every open stream on it ends, as if the connection
    /// had been lost.
    pub fn disconnect(&self, topic: &str) {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.remove(topic);
    }
}

#[async_trait]
impl BrokerTransport for MemoryTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        // No receivers is not an error for pub/sub.
        let _ = self.sender(topic).send(payload);
        Ok(())
    }

    async fn open(&self, topic: &str) -> Result<MessageStream> {
        let topic_name = topic.to_string();
        let stream = BroadcastStream::new(self.sender(topic).subscribe()).map(move |item| {
            item.map_err(|e| Error::transport(format!("receive on {topic_name}"), e))
        });
        Ok(stream.boxed())
    }
}
