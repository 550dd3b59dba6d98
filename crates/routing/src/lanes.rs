use std::{future::Future, num::NonZeroUsize, sync::Arc, time::Duration};

use {
    botbridge_common::task::catch_panic,
    tokio::{sync::mpsc, task::JoinSet},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{Error, Result};

/// Slots per lane. A full lane blocks the sender.
const LANE_DEPTH: usize = 1;

/// Spawn `count` lanes, each drained by one worker running `work(lane, item)`
/// on every item in arrival order.
///
/// A panic inside `work` is logged and the worker moves on to the next item.
/// Workers exit once every [`LaneSender`] clone is dropped and their lane is
/// empty.
pub fn spawn<T, W, Fut>(name: &'static str, count: NonZeroUsize, work: W) -> (LaneSender<T>, LaneWorkers)
where
    T: Send + 'static,
    W: Fn(usize, T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut senders = Vec::with_capacity(count.get());
    let mut workers = JoinSet::new();
    for lane in 0..count.get() {
        let (tx, mut rx) = mpsc::channel::<T>(LANE_DEPTH);
        senders.push(tx);
        let work = work.clone();
        workers.spawn(async move {
            while let Some(item) = rx.recv().await {
                if let Err(panic) = catch_panic(work(lane, item)).await {
                    error!(lanes = name, lane, error = %panic, "lane worker panicked, continuing");
                }
            }
            debug!(lanes = name, lane, "lane worker stopped");
        });
    }
    info!(lanes = name, count = count.get(), "lane workers started");
    (
        LaneSender {
            senders: Arc::from(senders),
        },
        LaneWorkers { name, workers },
    )
}

/// Producer side of a lane set. Cheap to clone.
pub struct LaneSender<T> {
    senders: Arc<[mpsc::Sender<T>]>,
}

impl<T> Clone for LaneSender<T> {
    fn clone(&self) -> Self {
        Self {
            senders: Arc::clone(&self.senders),
        }
    }
}

impl<T: Send> LaneSender<T> {
    /// Number of lanes, fixed at spawn time.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Enqueue `item` on `lane`, waiting while the lane is full.
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires first and
    /// [`Error::LaneClosed`] if the worker is gone.
    pub async fn send(&self, lane: usize, item: T, cancel: &CancellationToken) -> Result<()> {
        let sender = self.senders.get(lane).ok_or(Error::LaneClosed { lane })?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            sent = sender.send(item) => sent.map_err(|_| Error::LaneClosed { lane }),
        }
    }
}

/// Worker side of a lane set.
pub struct LaneWorkers {
    name: &'static str,
    workers: JoinSet<()>,
}

impl LaneWorkers {
    /// Wait up to `grace` for workers to drain their lanes, then abort the
    /// rest. Senders must already be dropped for workers to finish on their
    /// own.
    pub async fn drain(mut self, grace: Duration) {
        let name = self.name;
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = self.workers.join_next().await {
                if let Err(e) = joined {
                    warn!(lanes = name, error = %e, "lane worker failed");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                lanes = name,
                remaining = self.workers.len(),
                ?grace,
                "lane workers did not drain in time, aborting"
            );
            self.workers.abort_all();
            while self.workers.join_next().await.is_some() {}
        }
        info!(lanes = name, "lane workers stopped");
    }
}
