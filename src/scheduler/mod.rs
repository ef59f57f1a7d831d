//! Scheduling primitives shared by every job loop.
//!
//! This module provides:
//! - **Rate limiting**: Per-account cool-down state after provider flood waits.
//! - **Backoff controller**: One classification policy for every client error
//!   (rate-limited, permanent target error, transient, connection).
//! - **Fan-out executor**: Runs one cycle's work items concurrently across
//!   accounts under a concurrency ceiling and tallies a [`CycleResult`].
//!
//! [`CycleResult`]: crate::domain::CycleResult

mod backoff;
mod fanout;
mod rate_limit;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use backoff::{BackoffConfig, BackoffController, ErrorClass};
pub use fanout::{FanOutExecutor, SessionEvictor};
pub use rate_limit::{RATE_LIMIT_MARGIN, RateLimitState};

/// Sleep for `duration` unless `cancel` fires first.
///
/// Returns true if the full duration elapsed.
pub async fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
