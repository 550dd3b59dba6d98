use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    botbridge_broker::{BrokerClient, RedisTransport},
    botbridge_channels::{InboundUpdate, Platform, handlers::default_registry},
    botbridge_config::Config,
    botbridge_routing::{InboundRouter, OutboundRouter, RateBudget},
    botbridge_telegram::TelegramUpdate,
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

/// Wire everything up and run until a shutdown signal or the end of the
/// update stream.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let bot = botbridge_telegram::connect(&config.telegram)
        .await
        .context("connecting to telegram")?;

    let transport = RedisTransport::connect(&config.broker.url())
        .await
        .context("connecting to broker")?;
    let broker = BrokerClient::new(Arc::new(transport));

    let platform: Arc<dyn Platform> = Arc::new(bot.platform());
    let registry = Arc::new(default_registry(Arc::clone(&platform)));
    info!(handlers = registry.len(), "event handlers registered");

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let budget = Arc::new(RateBudget::per_minute(config.ratelimit));
    let outbound = OutboundRouter::start(
        &broker,
        &config.outbox,
        registry,
        budget,
        config.concurrency,
        shutdown.child_token(),
    )
    .await
    .context("subscribing to outbox")?;

    let inbound = InboundRouter::<TelegramUpdate>::start(
        broker,
        config.inbox.clone(),
        Arc::new(bot.normalizer()),
        platform,
        config.concurrency,
        shutdown.child_token(),
    );

    let (updates, poller) = bot.start_polling(shutdown.child_token());
    info!(
        inbox = %config.inbox,
        outbox = %config.outbox,
        concurrency = config.concurrency.get(),
        ratelimit = config.ratelimit.get(),
        "botbridge running"
    );

    supervise(
        inbound,
        outbound,
        updates,
        poller,
        &shutdown,
        config.shutdown_grace,
    )
    .await;

    info!("botbridge stopped");
    Ok(())
}

/// Route updates until `shutdown` fires or the update stream ends, then stop
/// the poller and drain both routers within `grace` each.
async fn supervise<U: InboundUpdate>(
    inbound: InboundRouter<U>,
    outbound: OutboundRouter,
    updates: mpsc::Receiver<U>,
    poller: JoinHandle<()>,
    shutdown: &CancellationToken,
    grace: Duration,
) {
    inbound.run(updates).await;
    if !shutdown.is_cancelled() {
        warn!("update stream ended, shutting down");
        shutdown.cancel();
    }

    stop_poller(poller, grace).await;
    inbound.shutdown(grace).await;
    outbound.shutdown(grace).await;
}

async fn stop_poller(mut poller: JoinHandle<()>, grace: Duration) {
    match tokio::time::timeout(grace, &mut poller).await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => warn!(error = %e, "telegram polling task failed"),
        Err(_) => {
            warn!(?grace, "telegram polling did not stop in time, aborting");
            poller.abort();
        },
    }
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => return,
    }
    info!("shutdown signal received");
    shutdown.cancel();
}
