use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use {
    anyhow::Context,
    async_trait::async_trait,
    botbridge_broker::{BrokerClient, Subscriber, Subscription},
    botbridge_channels::EventHandlerRegistry,
    botbridge_common::Envelope,
    rand::Rng,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info},
};

use crate::{LaneSender, LaneWorkers, RateBudget, Result, lanes};

/// Executes outbound envelopes from the outbox topic.
///
/// Every envelope first takes a token from the shared [`RateBudget`], then
/// goes to a uniformly random lane. There is no per-conversation ordering on
/// this side.
pub struct OutboundRouter {
    subscription: Subscription,
    workers: LaneWorkers,
    cancel: CancellationToken,
}

struct Admission {
    lanes: LaneSender<Envelope>,
    budget: Arc<RateBudget>,
    cancel: CancellationToken,
}

impl OutboundRouter {
    /// Spawn the lane workers and subscribe to `outbox`.
    ///
    /// Fails if the first broker connection cannot be made.
    pub async fn start(
        broker: &BrokerClient,
        outbox: &str,
        registry: Arc<EventHandlerRegistry>,
        budget: Arc<RateBudget>,
        concurrency: NonZeroUsize,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let (lanes, workers) = lanes::spawn("outbound", concurrency, move |lane, envelope: Envelope| {
            let registry = Arc::clone(&registry);
            async move { execute(&registry, lane, envelope).await }
        });

        let admission = Arc::new(Admission {
            lanes,
            budget,
            cancel: cancel.clone(),
        });
        let subscription = match broker.subscribe(outbox, admission).await {
            Ok(subscription) => subscription,
            Err(e) => {
                // The failed subscribe already dropped the only lane sender.
                workers.drain(Duration::ZERO).await;
                return Err(e.into());
            },
        };
        info!(topic = outbox, lanes = concurrency.get(), "outbound router started");

        Ok(Self {
            subscription,
            workers,
            cancel,
        })
    }

    /// Stop receiving, then give queued envelopes `grace` to finish.
    pub async fn shutdown(self, grace: Duration) {
        self.cancel.cancel();
        self.subscription.shutdown(grace).await;
        self.workers.drain(grace).await;
    }
}

#[async_trait]
impl Subscriber for Admission {
    async fn on_event(&self, envelope: Envelope) -> anyhow::Result<()> {
        let event_type = envelope.event_type.clone();
        self.budget
            .acquire(&self.cancel)
            .await
            .with_context(|| format!("dropping {event_type} envelope: no rate budget"))?;

        let lane = rand::rng().random_range(0..self.lanes.len());
        debug!(lane, event_type = %event_type, "admitted outbound event");
        self.lanes
            .send(lane, envelope, &self.cancel)
            .await
            .with_context(|| format!("dropping {event_type} envelope: lane {lane} unavailable"))?;
        Ok(())
    }
}

async fn execute(registry: &EventHandlerRegistry, lane: usize, envelope: Envelope) {
    match registry.dispatch(&envelope).await {
        Ok(()) => debug!(lane, event_type = %envelope.event_type, "outbound event handled"),
        Err(e) => error!(
            lane,
            event_type = %envelope.event_type,
            payload = %envelope.data,
            error = %e,
            "outbound event failed"
        ),
    }
}
