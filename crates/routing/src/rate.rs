use std::num::NonZeroU32;

use {
    governor::{
        Quota, RateLimiter,
        clock::DefaultClock,
        state::{InMemoryState, NotKeyed},
    },
    tokio_util::sync::CancellationToken,
};

use crate::{Error, Result};

/// Token bucket shared by all outbound lanes.
///
/// Holds up to `limit` tokens and refills one every `60s / limit`, so no
/// rolling minute admits more than `limit` plus the tokens refilled within
/// it.
pub struct RateBudget {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateBudget {
    #[must_use]
    pub fn per_minute(limit: NonZeroU32) -> Self {
        Self::with_quota(Quota::per_minute(limit))
    }

    #[must_use]
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Wait for a token. Never gives up on its own: the only failure is
    /// [`Error::Cancelled`] when `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = self.limiter.until_ready() => Ok(()),
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
