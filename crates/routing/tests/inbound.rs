//! Inbound routing against the in-memory broker.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use {
    botbridge_broker::{BrokerClient, MemoryTransport},
    botbridge_channels::PlatformRequest,
    botbridge_common::{EventKind, types::PreCheckoutAnswer},
    botbridge_routing::InboundRouter,
    serde_json::json,
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
};

use common::{Collector, DownBroker, FakeNormalizer, FakeUpdate, RecordingPlatform, eventually};

const INBOX: &str = "inbox";

fn lanes(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

struct Harness {
    router: InboundRouter<FakeUpdate>,
    collector: Arc<Collector>,
    platform: Arc<RecordingPlatform>,
    _subscription: botbridge_broker::Subscription,
}

async fn harness(concurrency: usize, normalizer: FakeNormalizer) -> Harness {
    let broker = BrokerClient::new(Arc::new(MemoryTransport::new()));
    let collector = Arc::new(Collector::default());
    let subscription = broker.subscribe(INBOX, collector.clone()).await.unwrap();
    let platform = Arc::new(RecordingPlatform::default());
    let router = InboundRouter::start(
        broker,
        INBOX,
        Arc::new(normalizer),
        platform.clone(),
        lanes(concurrency),
        CancellationToken::new(),
    );
    Harness {
        router,
        collector,
        platform,
        _subscription: subscription,
    }
}

fn seqs_for(collector: &Collector, chat: i64) -> Vec<u64> {
    collector
        .received()
        .iter()
        .filter(|e| e.data["chat"]["id"] == json!(chat))
        .map(|e| e.data["seq"].as_u64().unwrap())
        .collect()
}

#[tokio::test]
async fn same_conversation_is_published_in_arrival_order() {
    for concurrency in [1, 3, 8] {
        let h = harness(concurrency, FakeNormalizer::default()).await;
        for seq in 0..40 {
            h.router.route(FakeUpdate::message(7, seq)).await.unwrap();
            h.router
                .route(FakeUpdate::message(-100 - i64::from(seq % 5), seq))
                .await
                .unwrap();
        }
        eventually("all inbound events", || h.collector.received().len() == 80).await;

        assert_eq!(seqs_for(&h.collector, 7), (0..40).collect::<Vec<_>>());
        for chat in -104..=-100 {
            let seqs = seqs_for(&h.collector, chat);
            let mut sorted = seqs.clone();
            sorted.sort_unstable();
            assert_eq!(seqs, sorted, "chat {chat} reordered with {concurrency} lanes");
        }
        assert!(
            h.collector
                .received()
                .iter()
                .all(|e| e.kind().unwrap() == EventKind::Message)
        );
        h.router.shutdown(Duration::from_secs(1)).await;
    }
}

#[tokio::test]
async fn run_consumes_the_update_stream_until_it_ends() {
    let h = harness(4, FakeNormalizer::default()).await;
    let (tx, rx) = mpsc::channel(1);
    let producer = tokio::spawn(async move {
        for seq in 0..20 {
            tx.send(FakeUpdate::message(1, seq)).await.unwrap();
        }
    });
    h.router.run(rx).await;
    producer.await.unwrap();

    eventually("all inbound events", || h.collector.received().len() == 20).await;
    assert_eq!(seqs_for(&h.collector, 1), (0..20).collect::<Vec<_>>());
    h.router.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn unsupported_updates_are_skipped() {
    let h = harness(2, FakeNormalizer::default()).await;
    let mut ignored = FakeUpdate::message(3, 0);
    ignored.kind = None;
    h.router.route(ignored).await.unwrap();
    h.router.route(FakeUpdate::message(3, 1)).await.unwrap();

    eventually("the supported update", || h.collector.received().len() == 1).await;
    assert_eq!(seqs_for(&h.collector, 3), vec![1]);
    h.router.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn a_panicking_update_does_not_stop_its_lane() {
    let h = harness(1, FakeNormalizer { panic_on: Some(2) }).await;
    for seq in 0..5 {
        h.router.route(FakeUpdate::message(9, seq)).await.unwrap();
    }
    eventually("the surviving updates", || h.collector.received().len() == 4).await;
    assert_eq!(seqs_for(&h.collector, 9), vec![0, 1, 3, 4]);
    h.router.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn pre_checkout_is_published_and_acknowledged() {
    let h = harness(2, FakeNormalizer::default()).await;
    h.router
        .route(FakeUpdate::pre_checkout(5, "pq-1"))
        .await
        .unwrap();

    eventually("the acknowledgement", || h.platform.count() == 1).await;
    eventually("the published query", || h.collector.received().len() == 1).await;
    assert_eq!(
        h.collector.received()[0].kind().unwrap(),
        EventKind::PreCheckoutQuery
    );
    assert_eq!(h.platform.sent(), vec![PlatformRequest::AnswerPreCheckoutQuery(
        PreCheckoutAnswer {
            pre_checkout_query_id: "pq-1".into(),
            ok: true,
            error_message: None,
        }
    )]);
    h.router.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn pre_checkout_is_acknowledged_even_if_publish_fails() {
    let broker = BrokerClient::new(Arc::new(DownBroker));
    let platform = Arc::new(RecordingPlatform::default());
    let router = InboundRouter::start(
        broker,
        INBOX,
        Arc::new(FakeNormalizer::default()),
        platform.clone(),
        lanes(2),
        CancellationToken::new(),
    );
    router.route(FakeUpdate::message(1, 0)).await.unwrap();
    router
        .route(FakeUpdate::pre_checkout(1, "pq-2"))
        .await
        .unwrap();

    eventually("the acknowledgement", || platform.count() == 1).await;
    assert!(matches!(
        &platform.sent()[0],
        PlatformRequest::AnswerPreCheckoutQuery(answer) if answer.pre_checkout_query_id == "pq-2" && answer.ok
    ));
    router.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn shutdown_unblocks_a_full_router() {
    let platform = Arc::new(common::StuckPlatform);
    let router = InboundRouter::start(
        BrokerClient::new(Arc::new(MemoryTransport::new())),
        INBOX,
        Arc::new(FakeNormalizer::default()),
        platform,
        lanes(1),
        CancellationToken::new(),
    );
    // The first query wedges the worker on its acknowledgement, the second
    // fills the slot.
    router.route(FakeUpdate::pre_checkout(1, "a")).await.unwrap();
    router.route(FakeUpdate::pre_checkout(1, "b")).await.unwrap();

    let (tx, rx) = mpsc::channel(1);
    tx.send(FakeUpdate::message(1, 3)).await.unwrap();
    let run = tokio::time::timeout(Duration::from_millis(100), router.run(rx)).await;
    assert!(run.is_err(), "run should block on the full lane");

    tokio::time::timeout(Duration::from_secs(5), router.shutdown(Duration::from_millis(100)))
        .await
        .expect("shutdown must not hang");
    drop(tx);
}
