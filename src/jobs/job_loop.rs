//! Generic job loop shape.
//!
//! Every job kind runs the same cycle:
//!
//! ```text
//! loop {
//!     checkpoint: cancelled? ─► exit
//!     behavior.run_cycle()
//!       ├─ Idle(reason)        ─► sleep idle interval
//!       ├─ Completed(result)   ─► log tally, sleep cycle interval
//!       └─ Err (store failure) ─► log, sleep idle interval, retry
//! }
//! ```
//!
//! The loop only ends through its cancellation token.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::JobConfig;
use crate::domain::{AccountCredential, CycleResult, JobKind, TenantId, WorkItem};
use crate::error::Result;
use crate::id::{generate_cycle_id, generate_run_id};
use crate::network::{ClientError, NetworkClient};
use crate::scheduler::{BackoffController, FanOutExecutor, sleep_unless_cancelled};
use crate::session::AccountSessionPool;
use crate::storage::Store;

/// What one cycle amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    /// Nothing to do (no accounts, content, targets or rules)
    Idle(String),
    /// Work was fanned out
    Completed(CycleResult),
}

/// Per-kind cycle logic plugged into [`JobLoop`]
#[async_trait]
pub trait JobBehavior: Send {
    /// Run one cycle. Errors mean the cycle could not be entered at all.
    async fn run_cycle(&mut self, ctx: &JobContext, cycle: u64) -> Result<CycleStatus>;
}

/// Everything a cycle needs, bound to one (tenant, kind)
#[derive(Clone)]
pub struct JobContext {
    pub tenant: TenantId,
    pub kind: JobKind,
    pub config: JobConfig,
    pub store: Arc<dyn Store>,
    pub pool: Arc<AccountSessionPool>,
    pub backoff: Arc<BackoffController>,
    pub cancel: CancellationToken,
}

/// An account with a live client for this cycle
#[derive(Clone)]
pub struct ConnectedAccount {
    pub credential: AccountCredential,
    pub client: Arc<dyn NetworkClient>,
}

impl JobContext {
    /// Fan-out executor wired to this context's backoff, pool and pacing
    pub fn executor(&self) -> FanOutExecutor {
        FanOutExecutor::new(self.backoff.clone())
            .with_evictor(self.pool.clone())
            .with_item_pause(self.config.item_pause)
    }

    /// Acquire a live client for every account.
    ///
    /// Accounts that cannot be connected are skipped for this cycle only.
    pub async fn connect_accounts(
        &self,
        accounts: &[AccountCredential],
        result: &mut CycleResult,
    ) -> Vec<ConnectedAccount> {
        if self.cancel.is_cancelled() {
            return Vec::new();
        }

        let clients = join_all(accounts.iter().map(|account| self.pool.acquire(account))).await;

        let mut connected = Vec::with_capacity(accounts.len());
        for (account, client) in accounts.iter().zip(clients) {
            match client {
                Some(client) => connected.push(ConnectedAccount {
                    credential: account.clone(),
                    client,
                }),
                None => {
                    tracing::warn!(account = %account.label, "Could not connect, skipping account this cycle");
                    result.record_skipped_account(format!("{}: not connected", account.label));
                }
            }
        }
        connected
    }

    /// Handle an account-level failure outside the fan-out (e.g. listing
    /// destinations). The account sits out the rest of the cycle.
    pub async fn skip_account(&self, account: &ConnectedAccount, err: &ClientError, result: &mut CycleResult) {
        let class = self.backoff.record_failure(account.credential.id, err);
        if err.is_connection_level() {
            self.pool.release_on_error(account.credential.id).await;
        }
        tracing::warn!(account = %account.credential.label, class = %class, error = %err, "Account skipped this cycle");
        result.record_skipped_account(format!("{}: {} ({})", account.credential.label, class, err));
    }

    /// Fan `items` out with `operation` under this kind's concurrency ceiling
    pub async fn fan_out<F, Fut>(&self, items: Vec<WorkItem>, operation: F) -> CycleResult
    where
        F: Fn(WorkItem) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<String, ClientError>>,
    {
        self.executor()
            .run(items, operation, self.config.max_concurrency, &self.cancel)
            .await
    }
}

/// Client lookup for fan-out operations
pub fn client_map(connected: &[ConnectedAccount]) -> HashMap<u64, Arc<dyn NetworkClient>> {
    connected
        .iter()
        .map(|account| (account.credential.id, account.client.clone()))
        .collect()
}

/// Totals over a loop's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub run_id: String,
    pub cycles: u64,
    pub idle_cycles: u64,
    pub failed_cycles: u64,
    pub totals: CycleResult,
}

/// Drives a [`JobBehavior`] until cancelled
pub struct JobLoop {
    ctx: JobContext,
    behavior: Box<dyn JobBehavior>,
}

impl JobLoop {
    pub fn new(ctx: JobContext, behavior: Box<dyn JobBehavior>) -> Self {
        Self { ctx, behavior }
    }

    /// Run cycles until the context's token is cancelled.
    pub async fn run(mut self) -> LoopSummary {
        let run_id = generate_run_id(&self.ctx.tenant, self.ctx.kind);
        let span = tracing::info_span!(
            "job",
            tenant = %self.ctx.tenant,
            kind = %self.ctx.kind,
            run = %run_id,
        );

        async move {
            let mut summary = LoopSummary {
                run_id: run_id.clone(),
                ..Default::default()
            };
            tracing::info!("Job loop started");

            loop {
                // Top-of-cycle checkpoint
                if self.ctx.cancel.is_cancelled() {
                    break;
                }

                summary.cycles += 1;
                let cycle_id = generate_cycle_id(&run_id, summary.cycles);

                let pause = match self.behavior.run_cycle(&self.ctx, summary.cycles).await {
                    Ok(CycleStatus::Idle(reason)) => {
                        summary.idle_cycles += 1;
                        tracing::debug!(cycle = %cycle_id, "Idle: {}", reason);
                        self.ctx.config.idle_interval
                    }
                    Ok(CycleStatus::Completed(result)) => {
                        tracing::info!(
                            cycle = %cycle_id,
                            attempted = result.attempted,
                            succeeded = result.succeeded,
                            failed = result.failed,
                            rate_limited = result.rate_limited,
                            skipped_accounts = result.skipped_accounts,
                            "Cycle finished"
                        );
                        for note in &result.notes {
                            tracing::debug!(cycle = %cycle_id, "{}", note);
                        }
                        summary.totals.merge(result);
                        self.ctx.config.cycle_interval
                    }
                    Err(e) => {
                        summary.failed_cycles += 1;
                        tracing::warn!(cycle = %cycle_id, error = %e, "Cycle could not run, retrying after idle interval");
                        self.ctx.config.idle_interval
                    }
                };

                if !sleep_unless_cancelled(pause, &self.ctx.cancel).await {
                    break;
                }
            }

            tracing::info!(cycles = summary.cycles, "Job loop stopped");
            summary
        }
        .instrument(span)
        .await
    }
}
