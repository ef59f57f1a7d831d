//! Backoff controller.
//!
//! Centralizes how raw [`ClientError`]s are classified and how per-account
//! cool-downs are tracked. Every job kind shares this one policy:
//!
//! | Error                                              | Class             | Effect                              |
//! |----------------------------------------------------|-------------------|-------------------------------------|
//! | `RateLimited { retry_after }`                      | `RateLimited`     | account pauses `retry_after + 1s`   |
//! | `TargetUnreachable`, `AlreadyMember`, `InvalidTarget` | `PermanentTarget` | item terminally failed, no retry |
//! | `Connection`, `Unauthorized`                       | `Connection`      | session evicted, account skipped    |
//! | `Other`                                            | `Transient`       | logged, next item proceeds          |

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::rate_limit::RateLimitState;
use super::sleep_unless_cancelled;
use crate::network::ClientError;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider-imposed cool-down for the account
    RateLimited(Duration),
    /// The work item can never succeed (gone, invalid, already done)
    PermanentTarget,
    /// Try again next cycle
    Transient,
    /// The account's connection is broken; evict the session
    Connection,
}

impl ErrorClass {
    /// Whether a later cycle may retry the same item
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::PermanentTarget)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::RateLimited(wait) => write!(f, "rate-limited({}s)", wait.as_secs()),
            ErrorClass::PermanentTarget => f.write_str("permanent"),
            ErrorClass::Transient => f.write_str("transient"),
            ErrorClass::Connection => f.write_str("connection"),
        }
    }
}

/// Backoff tuning.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Cap on the exponential floor applied to repeated rate limits.
    pub max_floor: Duration,
    /// Cool-downs longer than this abandon the account for the rest of the cycle
    /// instead of being waited out inline.
    pub max_inline_wait: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_floor: Duration::from_secs(64),
            max_inline_wait: Duration::from_secs(300),
        }
    }
}

/// Process-wide per-account cool-down tracker.
///
/// Shared by all job loops: a rate limit hit by one job kind also pauses the
/// other kinds using the same account.
#[derive(Debug, Default)]
pub struct BackoffController {
    config: BackoffConfig,
    accounts: Mutex<HashMap<u64, RateLimitState>>,
}

impl BackoffController {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Map a raw client error to its class.
    pub fn classify(err: &ClientError) -> ErrorClass {
        match err {
            ClientError::RateLimited { retry_after } => ErrorClass::RateLimited(*retry_after),
            ClientError::TargetUnreachable(_) | ClientError::AlreadyMember(_) | ClientError::InvalidTarget(_) => {
                ErrorClass::PermanentTarget
            }
            ClientError::Connection(_) | ClientError::Unauthorized => ErrorClass::Connection,
            ClientError::Other(_) => ErrorClass::Transient,
        }
    }

    /// Classify a failure and update the account's cool-down.
    pub fn record_failure(&self, account_id: u64, err: &ClientError) -> ErrorClass {
        let class = Self::classify(err);
        if let ErrorClass::RateLimited(retry_after) = class {
            let delay = self
                .lock()
                .entry(account_id)
                .or_default()
                .record_rate_limit(retry_after, self.config.max_floor);
            tracing::warn!(
                account_id,
                retry_after_secs = retry_after.as_secs(),
                pause_secs = delay.as_secs(),
                "Account rate limited, pausing further attempts"
            );
        }
        class
    }

    pub fn record_success(&self, account_id: u64) {
        if let Some(state) = self.lock().get_mut(&account_id) {
            state.record_success();
        }
    }

    /// Remaining cool-down for the account, if any
    pub fn remaining(&self, account_id: u64) -> Option<Duration> {
        self.lock().get(&account_id).and_then(RateLimitState::remaining_backoff)
    }

    /// Wait out the account's cool-down.
    ///
    /// Returns false without waiting when the cool-down exceeds
    /// `max_inline_wait`, or when `cancel` fires during the wait.
    pub async fn wait_ready(&self, account_id: u64, cancel: &CancellationToken) -> bool {
        match self.remaining(account_id) {
            None => true,
            Some(wait) if wait > self.config.max_inline_wait => {
                tracing::info!(
                    account_id,
                    wait_secs = wait.as_secs(),
                    "Cool-down too long, skipping account for this cycle"
                );
                false
            }
            Some(wait) => sleep_unless_cancelled(wait, cancel).await,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, RateLimitState>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
