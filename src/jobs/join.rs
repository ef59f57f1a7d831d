//! Target joining job.
//!
//! Targets are spread over accounts in rounds: in round `k` pending target
//! `i` goes to account `(i + k) % n`. A target that fails with a retryable
//! error stays pending and is handed to the next account in the following
//! round, so each target is tried by at most every account once per cycle
//! and stops as soon as one account gets in.

use std::sync::Arc;

use async_trait::async_trait;

use super::job_loop::{CycleStatus, JobBehavior, JobContext, client_map};
use crate::domain::{CycleResult, Payload, TargetStatus, WorkItem};
use crate::error::Result;
use crate::network::ClientError;
use crate::storage::Store;

#[derive(Debug, Default)]
pub struct JoinJob;

impl JoinJob {
    pub fn new() -> Self {
        Self
    }
}

/// Status a join error settles the target into, if any
fn settled_status(err: &ClientError) -> Option<TargetStatus> {
    match err {
        ClientError::AlreadyMember(_) => Some(TargetStatus::Joined),
        ClientError::TargetUnreachable(_) | ClientError::InvalidTarget(_) => Some(TargetStatus::Failed),
        _ => None,
    }
}

async fn mark(store: &dyn Store, target_id: u64, link: &str, status: TargetStatus) {
    if let Err(e) = store.mark_target_status(target_id, status).await {
        tracing::warn!(target = %link, error = %e, "Failed to record target status");
    }
}

#[async_trait]
impl JobBehavior for JoinJob {
    async fn run_cycle(&mut self, ctx: &JobContext, _cycle: u64) -> Result<CycleStatus> {
        let accounts = ctx.store.list_eligible_accounts(&ctx.tenant).await?;
        if accounts.is_empty() {
            return Ok(CycleStatus::Idle("no eligible accounts".into()));
        }
        let targets = ctx.store.list_pending_targets(&ctx.tenant).await?;
        if targets.is_empty() {
            return Ok(CycleStatus::Idle("no pending targets".into()));
        }

        let mut result = CycleResult::new();
        let connected = ctx.connect_accounts(&accounts, &mut result).await;
        if connected.is_empty() {
            return Ok(CycleStatus::Completed(result));
        }

        let clients = client_map(&connected);
        let store: Arc<dyn Store> = ctx.store.clone();
        let order: Vec<u64> = targets.iter().map(|t| t.id).collect();

        for round in 0..connected.len() {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let pending = if round == 0 {
                targets.clone()
            } else {
                // Joins already went out this cycle; keep the cycle and its pacing
                match ctx.store.list_pending_targets(&ctx.tenant).await {
                    Ok(pending) => pending,
                    Err(e) => {
                        tracing::warn!(round, error = %e, "Failed to re-read pending targets, ending rounds early");
                        break;
                    }
                }
            };

            let mut items = Vec::new();
            for target in pending {
                // Only targets seen at the start of the cycle keep their slot
                let Some(index) = order.iter().position(|id| *id == target.id) else {
                    continue;
                };
                let account = &connected[(index + round) % connected.len()];
                items.push(WorkItem::join(account.credential.id, &account.credential.label, target));
            }
            if items.is_empty() {
                break;
            }

            tracing::debug!(round, items = items.len(), "Join round planned");

            let outcome = ctx
                .fan_out(items, |item| {
                    let client = clients.get(&item.account_id).cloned();
                    let store = store.clone();
                    async move {
                        let client = client.ok_or_else(|| ClientError::Connection("no live session".into()))?;
                        let Payload::Join(target) = &item.payload else {
                            return Err(ClientError::Other("not a join item".into()));
                        };
                        match client.join(target).await {
                            Ok(()) => {
                                mark(store.as_ref(), target.id, &target.link, TargetStatus::Joined).await;
                                Ok("joined".to_string())
                            }
                            Err(err) => {
                                if let Some(status) = settled_status(&err) {
                                    mark(store.as_ref(), target.id, &target.link, status).await;
                                }
                                Err(err)
                            }
                        }
                    }
                })
                .await;
            result.merge(outcome);
        }

        Ok(CycleStatus::Completed(result))
    }
}
