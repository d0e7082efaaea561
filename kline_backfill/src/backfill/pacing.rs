//! Request pacing.
//!
//! Two independent mechanisms: a fixed politeness pause after every n-th call
//! of one symbol, and an optional token bucket shared by every symbol of a
//! run so parallel backfills stay under the source's request budget.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::debug;

/// Token bucket shared across symbols.
pub type SharedLimiter = Arc<DefaultDirectRateLimiter>;

/// A limiter admitting `requests_per_minute` requests per minute.
pub fn shared_limiter(requests_per_minute: NonZeroU32) -> SharedLimiter {
    Arc::new(RateLimiter::direct(Quota::per_minute(requests_per_minute)))
}

#[derive(Clone)]
pub struct Pacer {
    pause_every: u64,
    pause: Duration,
    limiter: Option<SharedLimiter>,
}

impl Pacer {
    pub fn new(pause_every: u64, pause: Duration) -> Self {
        Self {
            pause_every: pause_every.max(1),
            pause,
            limiter: None,
        }
    }

    pub fn with_limiter(mut self, limiter: SharedLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Wait for a token before issuing a request.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Whether the call that brought the count to `call_count` is followed
    /// by a pause.
    pub fn pauses_after(&self, call_count: u64) -> bool {
        call_count > 0 && call_count % self.pause_every == 0
    }

    /// Sleep if `call_count` lands on the pause period. Returns whether it did.
    pub async fn after_call(&self, call_count: u64) -> bool {
        if !self.pauses_after(call_count) {
            return false;
        }
        debug!(call_count, pause_ms = self.pause.as_millis() as u64, "politeness pause");
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
        true
    }
}
