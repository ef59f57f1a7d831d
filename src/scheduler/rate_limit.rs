//! Rate limit state for one account.
//!
//! When the provider rejects a request with a flood wait, further attempts on
//! that account must pause for at least the requested time plus a one second
//! margin. Other accounts are unaffected.

use std::time::Duration;

use tokio::time::Instant;

/// Margin added on top of the provider's requested wait.
pub const RATE_LIMIT_MARGIN: Duration = Duration::from_secs(1);

/// Rate limit state tracked per account.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    /// When attempts may resume (None = no active limit).
    pub backoff_until: Option<Instant>,
    /// Number of consecutive rate limit hits.
    pub consecutive_hits: u32,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self {
            backoff_until: None,
            consecutive_hits: 0,
        }
    }

    /// Remaining cool-down, if any.
    pub fn remaining_backoff(&self) -> Option<Duration> {
        self.backoff_until.and_then(|until| {
            let now = Instant::now();
            if now < until { Some(until - now) } else { None }
        })
    }

    /// Record a rate limit response and return the imposed delay.
    ///
    /// The delay is the maximum of:
    /// - the provider's `retry_after` plus [`RATE_LIMIT_MARGIN`]
    /// - 2^consecutive_hits seconds, capped at `max_floor`
    ///
    /// An already-running longer cool-down is never shortened.
    pub fn record_rate_limit(&mut self, retry_after: Duration, max_floor: Duration) -> Duration {
        self.consecutive_hits += 1;

        let exp_backoff = Duration::from_secs(2u64.pow(self.consecutive_hits.min(6))).min(max_floor);
        let delay = (retry_after + RATE_LIMIT_MARGIN).max(exp_backoff);

        let until = Instant::now() + delay;
        self.backoff_until = Some(match self.backoff_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });

        delay
    }

    /// Record a successful attempt; resets the consecutive hit counter.
    pub fn record_success(&mut self) {
        self.consecutive_hits = 0;
    }
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}
