use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    botbridge_common::{Envelope, task::catch_panic},
    futures::StreamExt,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{BrokerTransport, MessageStream, Result};

const RECONNECT_MIN_DELAY: Duration = Duration::from_millis(500);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Receives decoded envelopes from a subscription.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Handle one envelope. Errors are logged by the receive loop and never
    /// stop it.
    async fn on_event(&self, envelope: Envelope) -> anyhow::Result<()>;
}

/// Publishes envelopes and owns subscription receive loops.
#[derive(Clone)]
pub struct BrokerClient {
    transport: Arc<dyn BrokerTransport>,
}

impl BrokerClient {
    pub fn new(transport: Arc<dyn BrokerTransport>) -> Self {
        Self { transport }
    }

    /// Serialize and send one envelope. Failures are returned to the caller,
    /// which decides whether to log-and-drop.
    pub async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<()> {
        let payload = envelope.to_bytes()?;
        self.transport.publish(topic, payload).await
    }

    /// Subscribe `subscriber` to `topic`.
    ///
    /// The first connection is made before returning so misconfiguration
    /// surfaces at startup. The receive loop then runs on its own task until
    /// the returned [`Subscription`] is cancelled or dropped.
    pub async fn subscribe(
        &self,
        topic: &str,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<Subscription> {
        let stream = self.transport.open(topic).await?;
        let cancel = CancellationToken::new();
        let receive = ReceiveLoop {
            transport: Arc::clone(&self.transport),
            topic: topic.to_string(),
            subscriber,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(receive.run(stream));
        info!(topic, "broker subscription started");
        Ok(Subscription {
            topic: topic.to_string(),
            cancel,
            task: Some(task),
        })
    }
}

/// Handle to a running receive loop.
///
/// Cancelling stops future deliveries; an envelope already being handled is
/// not waited for unless [`Subscription::shutdown`] is used. Dropping the
/// handle cancels it.
pub struct Subscription {
    topic: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop the receive loop. Safe to call more than once.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait up to `grace` for the loop to exit, aborting it after.
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel();
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => debug!(topic = %self.topic, "broker subscription stopped"),
            Ok(Err(e)) => warn!(topic = %self.topic, error = %e, "broker receive loop failed"),
            Err(_) => {
                warn!(topic = %self.topic, ?grace, "broker receive loop did not stop in time, aborting");
                task.abort();
            },
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ReceiveLoop {
    transport: Arc<dyn BrokerTransport>,
    topic: String,
    subscriber: Arc<dyn Subscriber>,
    cancel: CancellationToken,
}

impl ReceiveLoop {
    async fn run(self, mut stream: MessageStream) {
        let topic = self.topic.as_str();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(payload)) => self.deliver(payload).await,
                Some(Err(e)) => warn!(topic, error = %e, "broker receive failed"),
                None => {
                    warn!(topic, "broker connection lost, reconnecting");
                    match self.reconnect().await {
                        Some(fresh) => stream = fresh,
                        None => break,
                    }
                },
            }
        }
        info!(topic, "broker receive loop exited");
    }

    /// Decode and hand one message to the subscriber. Nothing that happens
    /// here, including a panic, escapes into the loop.
    async fn deliver(&self, payload: Vec<u8>) {
        let topic = self.topic.as_str();
        let outcome = catch_panic(async {
            let envelope = match Envelope::from_slice(&payload) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(
                        topic,
                        error = %e,
                        payload = %String::from_utf8_lossy(&payload),
                        "dropping undecodable broker message"
                    );
                    return;
                },
            };
            let event_type = envelope.event_type.clone();
            debug!(topic, %event_type, "broker message received");
            if let Err(e) = self.subscriber.on_event(envelope).await {
                warn!(topic, %event_type, error = %e, "broker subscriber failed");
            }
        })
        .await;
        if let Err(panic) = outcome {
            error!(
                topic,
                error = %panic,
                payload = %String::from_utf8_lossy(&payload),
                "broker subscriber panicked"
            );
        }
    }

    /// Reopen the subscription with capped exponential backoff. Returns
    /// `None` once cancelled.
    async fn reconnect(&self) -> Option<MessageStream> {
        let topic = self.topic.as_str();
        let mut delay = RECONNECT_MIN_DELAY;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {},
            }
            let opened = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                opened = self.transport.open(topic) => opened,
            };
            match opened {
                Ok(stream) => {
                    info!(topic, "broker subscription re-established");
                    return Some(stream);
                },
                Err(e) => {
                    warn!(topic, error = %e, retry_in = ?delay, "broker reconnect failed");
                    delay = (delay * 2).min(RECONNECT_MAX_DELAY);
                },
            }
        }
    }
}
