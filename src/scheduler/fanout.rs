//! Fan-out executor.
//!
//! Applies one operation to every work item of a cycle, concurrently across
//! accounts and bounded by a concurrency ceiling.
//!
//! ```text
//! items ──► group by account ──► lane(account A) ─┐
//!                               lane(account B) ─┼─► join_all ──► CycleResult
//!                               lane(account C) ─┘
//!
//! lane:
//!   for item in items {
//!     ├─► checkpoint: cancelled? ─► stop lane
//!     ├─► inter-item pause (not before the first item)
//!     ├─► wait out account cool-down (BackoffController)
//!     ├─► acquire semaphore permit
//!     ├─► operation(item)
//!     │     ├─ Ok  ─► succeeded
//!     │     └─ Err ─► classify
//!     │               ├─ RateLimited     ─► failed, next item waits
//!     │               ├─ PermanentTarget ─► failed, no retry
//!     │               ├─ Transient       ─► failed, continue
//!     │               └─ Connection      ─► failed, evict session, stop lane
//!   }
//! ```
//!
//! Items of one account run sequentially so a cool-down recorded by one item
//! delays the next; lanes of other accounts keep going.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::backoff::{BackoffController, ErrorClass};
use super::sleep_unless_cancelled;
use crate::domain::{CycleResult, WorkItem};
use crate::network::ClientError;

/// Something that can drop a broken account session
#[async_trait]
pub trait SessionEvictor: Send + Sync {
    async fn evict(&self, account_id: u64);
}

/// Runs work items with per-account lanes and a global permit gate
pub struct FanOutExecutor {
    backoff: Arc<BackoffController>,
    evictor: Option<Arc<dyn SessionEvictor>>,
    item_pause: Duration,
}

impl FanOutExecutor {
    pub fn new(backoff: Arc<BackoffController>) -> Self {
        Self {
            backoff,
            evictor: None,
            item_pause: Duration::ZERO,
        }
    }

    pub fn with_evictor(mut self, evictor: Arc<dyn SessionEvictor>) -> Self {
        self.evictor = Some(evictor);
        self
    }

    /// Pause between consecutive items of the same account
    pub fn with_item_pause(mut self, pause: Duration) -> Self {
        self.item_pause = pause;
        self
    }

    /// Execute `operation` for every item, at most `max_concurrency` at a time.
    ///
    /// `operation` returns a short note on success. Failures are isolated per
    /// item and never abort siblings. Items not reached before `cancel` fires
    /// are not counted as attempted.
    pub async fn run<F, Fut>(
        &self,
        items: Vec<WorkItem>,
        operation: F,
        max_concurrency: usize,
        cancel: &CancellationToken,
    ) -> CycleResult
    where
        F: Fn(WorkItem) -> Fut,
        Fut: Future<Output = Result<String, ClientError>>,
    {
        if items.is_empty() {
            return CycleResult::new();
        }

        let permits = Semaphore::new(max_concurrency.max(1));
        let lanes = group_by_account(items);

        let results = join_all(
            lanes
                .into_iter()
                .map(|(account_id, lane)| self.run_lane(account_id, lane, &operation, &permits, cancel)),
        )
        .await;

        let mut total = CycleResult::new();
        for result in results {
            total.merge(result);
        }
        total
    }

    async fn run_lane<F, Fut>(
        &self,
        account_id: u64,
        items: Vec<WorkItem>,
        operation: &F,
        permits: &Semaphore,
        cancel: &CancellationToken,
    ) -> CycleResult
    where
        F: Fn(WorkItem) -> Fut,
        Fut: Future<Output = Result<String, ClientError>>,
    {
        let mut result = CycleResult::new();
        let total = items.len();

        for (index, item) in items.into_iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            if index > 0 && !self.item_pause.is_zero() && !sleep_unless_cancelled(self.item_pause, cancel).await {
                break;
            }
            if !self.backoff.wait_ready(account_id, cancel).await {
                if !cancel.is_cancelled() {
                    result.record_skipped_account(format!(
                        "{}: cooling down, {} item(s) left for next cycle",
                        item.account_label,
                        total - index
                    ));
                }
                break;
            }

            let _permit = tokio::select! {
                permit = permits.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = cancel.cancelled() => break,
            };
            // Last checkpoint before the send
            if cancel.is_cancelled() {
                break;
            }

            let description = item.describe();
            let label = item.account_label.clone();
            match operation(item).await {
                Ok(note) => {
                    self.backoff.record_success(account_id);
                    tracing::debug!(account = %label, "{}: {}", description, note);
                    result.record_success(format!("ok {}: {}", description, note));
                }
                Err(err) => {
                    let class = self.backoff.record_failure(account_id, &err);
                    tracing::debug!(account = %label, class = %class, error = %err, "{} failed", description);
                    let note = format!("{} {}: {}", class, description, err);
                    match class {
                        ErrorClass::RateLimited(_) => result.record_rate_limited(note),
                        ErrorClass::PermanentTarget | ErrorClass::Transient => result.record_failure(note),
                        ErrorClass::Connection => {
                            result.record_failure(note);
                            if let Some(evictor) = &self.evictor {
                                evictor.evict(account_id).await;
                            }
                            let left = total - index - 1;
                            if left > 0 {
                                result.record_skipped_account(format!(
                                    "{}: connection lost, {} item(s) left for next cycle",
                                    label, left
                                ));
                            }
                            break;
                        }
                    }
                }
            }
        }

        result
    }
}

/// Group items into per-account lanes, keeping first-seen account order and
/// item order within each account.
fn group_by_account(items: Vec<WorkItem>) -> Vec<(u64, Vec<WorkItem>)> {
    let mut lanes: Vec<(u64, Vec<WorkItem>)> = Vec::new();
    let mut lane_of: HashMap<u64, usize> = HashMap::new();
    for item in items {
        match lane_of.get(&item.account_id) {
            Some(&index) => lanes[index].1.push(item),
            None => {
                lane_of.insert(item.account_id, lanes.len());
                lanes.push((item.account_id, vec![item]));
            }
        }
    }
    lanes
}
