use {async_trait::async_trait, futures::stream::BoxStream};

use crate::Result;

/// Raw messages received on one topic.
///
/// An `Err` item is a transient receive failure; the stream stays usable.
/// The end of the stream means the connection is gone and the caller should
/// open a new one.
pub type MessageStream = BoxStream<'static, Result<Vec<u8>>>;

/// The byte-level pub/sub operations a broker must provide.
///
/// Delivery guarantees are whatever the backing broker gives; for Redis
/// pub/sub that is at-most-once with no persistence.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Send one payload to every current subscriber of `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Open a fresh subscription to `topic`.
    async fn open(&self, topic: &str) -> Result<MessageStream>;
}
