#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::{
    sync::Mutex,
    time::Duration,
};

use {
    async_trait::async_trait,
    botbridge_broker::{BrokerTransport, MessageStream, Subscriber},
    botbridge_channels::{InboundUpdate, Normalizer, Platform, PlatformRequest},
    botbridge_common::{Envelope, EventKind},
    serde::Serialize,
    serde_json::json,
};

/// Minimal platform update: a conversation, a sequence number and a kind.
#[derive(Debug, Clone, Serialize)]
pub struct FakeUpdate {
    pub kind: Option<EventKind>,
    pub chat: i64,
    pub seq: u32,
    pub pre_checkout: Option<String>,
}

impl FakeUpdate {
    pub fn message(chat: i64, seq: u32) -> Self {
        Self {
            kind: Some(EventKind::Message),
            chat,
            seq,
            pre_checkout: None,
        }
    }

    pub fn pre_checkout(chat: i64, id: &str) -> Self {
        Self {
            kind: Some(EventKind::PreCheckoutQuery),
            chat,
            seq: 0,
            pre_checkout: Some(id.to_string()),
        }
    }
}

impl InboundUpdate for FakeUpdate {
    fn kind(&self) -> Option<EventKind> {
        self.kind
    }

    fn conversation_id(&self) -> Option<i64> {
        Some(self.chat)
    }

    fn pre_checkout_query_id(&self) -> Option<&str> {
        self.pre_checkout.as_deref()
    }
}

/// Emits `{"chat": {"id": chat}, "seq": seq}`; panics on `panic_on`.
#[derive(Default)]
pub struct FakeNormalizer {
    pub panic_on: Option<u32>,
}

#[async_trait]
impl Normalizer<FakeUpdate> for FakeNormalizer {
    async fn normalize(&self, update: &FakeUpdate) -> botbridge_channels::Result<serde_json::Value> {
        if self.panic_on == Some(update.seq) {
            panic!("normalizer exploded on {}", update.seq);
        }
        Ok(json!({"chat": {"id": update.chat}, "seq": update.seq}))
    }
}

/// Records every request it is asked to send.
#[derive(Default)]
pub struct RecordingPlatform {
    sent: Mutex<Vec<PlatformRequest>>,
}

impl RecordingPlatform {
    pub fn sent(&self) -> Vec<PlatformRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn send(&self, request: PlatformRequest) -> botbridge_channels::Result<()> {
        self.sent.lock().unwrap().push(request);
        Ok(())
    }
}

/// A platform whose sends never complete.
pub struct StuckPlatform;

#[async_trait]
impl Platform for StuckPlatform {
    async fn send(&self, _request: PlatformRequest) -> botbridge_channels::Result<()> {
        std::future::pending().await
    }
}

/// Collects envelopes delivered on a subscription.
#[derive(Default)]
pub struct Collector {
    received: Mutex<Vec<Envelope>>,
}

impl Collector {
    pub fn received(&self) -> Vec<Envelope> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Subscriber for Collector {
    async fn on_event(&self, envelope: Envelope) -> anyhow::Result<()> {
        self.received.lock().unwrap().push(envelope);
        Ok(())
    }
}

/// Broker whose publishes always fail and whose subscriptions never yield.
pub struct DownBroker;

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
pub struct Refused;

#[async_trait]
impl BrokerTransport for DownBroker {
    async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> botbridge_broker::Result<()> {
        Err(botbridge_broker::Error::transport("publish", Refused))
    }

    async fn open(&self, _topic: &str) -> botbridge_broker::Result<MessageStream> {
        Err(botbridge_broker::Error::transport("subscribe", Refused))
    }
}

/// Poll `condition` every 10ms for up to 10s.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
