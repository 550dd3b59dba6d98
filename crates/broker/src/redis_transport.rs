use {
    async_trait::async_trait,
    futures::StreamExt,
    redis::{AsyncCommands, Client, aio::ConnectionManager},
    tracing::{debug, info},
};

use crate::{BrokerTransport, Error, MessageStream, Result};

/// Redis pub/sub transport.
///
/// Publishing goes through a shared [`ConnectionManager`] that reconnects on
/// its own. Every subscription opens a dedicated pub/sub connection; when that
/// connection drops, its stream ends and the client's receive loop opens a
/// new one.
#[derive(Clone)]
pub struct RedisTransport {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisTransport {
    /// Connect to the broker at `url` (`redis://[:password@]host:port/[db]`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| Error::transport("open redis client", e))?;
        let addr = client.get_connection_info().addr.to_string();
        info!(%addr, "connecting to redis");

        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| Error::transport(format!("connect to redis at {addr}"), e))?;

        info!(%addr, "connected to redis");
        Ok(Self { client, publisher })
    }
}

impl std::fmt::Debug for RedisTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTransport")
            .field("addr", &self.client.get_connection_info().addr.to_string())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BrokerTransport for RedisTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(|e| Error::transport(format!("publish to {topic}"), e))?;
        debug!(topic, receivers, "published to redis");
        Ok(())
    }

    async fn open(&self, topic: &str) -> Result<MessageStream> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| Error::transport("open redis pub/sub connection", e))?;
        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| Error::transport(format!("subscribe to {topic}"), e))?;
        info!(topic, "subscribed to redis topic");

        let stream = pubsub
            .into_on_message()
            .map(|msg| Ok(msg.get_payload_bytes().to_vec()));
        Ok(stream.boxed())
    }
}
