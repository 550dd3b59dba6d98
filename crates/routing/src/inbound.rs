use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use {
    botbridge_broker::BrokerClient,
    botbridge_channels::{InboundUpdate, Normalizer, Platform, PlatformRequest},
    botbridge_common::{Envelope, types::PreCheckoutAnswer},
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{LaneSender, LaneWorkers, Result, lanes, shard};

/// Shards platform updates by conversation and publishes them to the inbox
/// topic.
///
/// Updates of one conversation always share a lane and are published in
/// arrival order.
pub struct InboundRouter<U> {
    lanes: LaneSender<U>,
    workers: LaneWorkers,
    concurrency: NonZeroUsize,
    cancel: CancellationToken,
}

struct Publisher<U> {
    broker: BrokerClient,
    inbox: String,
    normalizer: Arc<dyn Normalizer<U>>,
    platform: Arc<dyn Platform>,
}

impl<U: InboundUpdate> InboundRouter<U> {
    /// Spawn `concurrency` lane workers. `cancel` aborts blocked
    /// [`route`](Self::route) calls and ends [`run`](Self::run).
    pub fn start(
        broker: BrokerClient,
        inbox: impl Into<String>,
        normalizer: Arc<dyn Normalizer<U>>,
        platform: Arc<dyn Platform>,
        concurrency: NonZeroUsize,
        cancel: CancellationToken,
    ) -> Self {
        let publisher = Arc::new(Publisher {
            broker,
            inbox: inbox.into(),
            normalizer,
            platform,
        });
        let (lanes, workers) = lanes::spawn("inbound", concurrency, move |lane, update: U| {
            let publisher = Arc::clone(&publisher);
            async move { publisher.process(lane, update).await }
        });
        Self {
            lanes,
            workers,
            concurrency,
            cancel,
        }
    }

    /// Put `update` on its conversation's lane, waiting while the lane is
    /// full.
    pub async fn route(&self, update: U) -> Result<()> {
        let conversation_id = update.conversation_id().unwrap_or_default();
        let lane = shard(conversation_id, self.concurrency);
        debug!(conversation_id, lane, "routing inbound update");
        self.lanes.send(lane, update, &self.cancel).await
    }

    /// Route every update from `updates` until the stream ends or the router
    /// is cancelled.
    pub async fn run(&self, mut updates: mpsc::Receiver<U>) {
        loop {
            let update = tokio::select! {
                _ = self.cancel.cancelled() => break,
                update = updates.recv() => update,
            };
            let Some(update) = update else {
                info!("inbound update stream ended");
                break;
            };
            if let Err(e) = self.route(update).await {
                debug!(error = %e, "inbound routing stopped");
                break;
            }
        }
    }

    /// Stop accepting updates and give buffered ones `grace` to publish.
    pub async fn shutdown(self, grace: Duration) {
        self.cancel.cancel();
        drop(self.lanes);
        self.workers.drain(grace).await;
    }
}

impl<U: InboundUpdate> Publisher<U> {
    async fn process(&self, lane: usize, update: U) {
        let conversation_id = update.conversation_id();

        match update.kind() {
            Some(kind) => match self.normalizer.normalize(&update).await {
                Ok(data) => {
                    let envelope = Envelope::new(kind, data);
                    match self.broker.publish(&self.inbox, &envelope).await {
                        Ok(()) => debug!(
                            lane,
                            ?conversation_id,
                            event_type = kind.as_str(),
                            "published inbound event"
                        ),
                        Err(e) => warn!(
                            lane,
                            ?conversation_id,
                            event_type = kind.as_str(),
                            update = %raw(&update),
                            error = %e,
                            "failed to publish inbound event, dropping"
                        ),
                    }
                },
                Err(e) => warn!(
                    lane,
                    ?conversation_id,
                    event_type = kind.as_str(),
                    update = %raw(&update),
                    error = %e,
                    "failed to normalize inbound update, dropping"
                ),
            },
            None => debug!(lane, ?conversation_id, "ignoring unsupported update kind"),
        }

        if let Some(id) = update.pre_checkout_query_id() {
            let ack = PlatformRequest::AnswerPreCheckoutQuery(PreCheckoutAnswer {
                pre_checkout_query_id: id.to_string(),
                ok: true,
                error_message: None,
            });
            if let Err(e) = self.platform.send(ack).await {
                warn!(lane, ?conversation_id, pre_checkout_query_id = id, error = %e, "failed to acknowledge pre-checkout query");
            }
        }
    }
}

fn raw<U: InboundUpdate>(update: &U) -> String {
    serde_json::to_string(update).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}
