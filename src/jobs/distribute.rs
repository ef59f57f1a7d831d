//! Content distribution job.
//!
//! Each cycle every connected account sends content to every group or
//! channel it belongs to. With [`Breadth::One`] an account sends a single
//! item, rotating through the content list cycle by cycle and staggered
//! across accounts; with [`Breadth::All`] it sends every item.

use async_trait::async_trait;

use super::job_loop::{CycleStatus, JobBehavior, JobContext, client_map};
use crate::config::Breadth;
use crate::domain::{ContentItem, CycleResult, Payload, WorkItem};
use crate::error::Result;
use crate::network::ClientError;

#[derive(Debug, Default)]
pub struct DistributeJob;

impl DistributeJob {
    pub fn new() -> Self {
        Self
    }
}

/// Content an account sends in a cycle (`cycle` starts at 1)
fn pick_content(content: &[ContentItem], breadth: Breadth, cycle: u64, account_index: usize) -> Vec<&ContentItem> {
    if content.is_empty() {
        return Vec::new();
    }
    match breadth {
        Breadth::One => {
            let index = (cycle.saturating_sub(1) as usize + account_index) % content.len();
            vec![&content[index]]
        }
        Breadth::All => content.iter().collect(),
    }
}

#[async_trait]
impl JobBehavior for DistributeJob {
    async fn run_cycle(&mut self, ctx: &JobContext, cycle: u64) -> Result<CycleStatus> {
        let accounts = ctx.store.list_eligible_accounts(&ctx.tenant).await?;
        if accounts.is_empty() {
            return Ok(CycleStatus::Idle("no eligible accounts".into()));
        }
        let content = ctx.store.list_content(&ctx.tenant).await?;
        if content.is_empty() {
            return Ok(CycleStatus::Idle("no content".into()));
        }

        let mut result = CycleResult::new();
        let connected = ctx.connect_accounts(&accounts, &mut result).await;

        let mut items = Vec::new();
        for (index, account) in connected.iter().enumerate() {
            // Per-account checkpoint
            if ctx.cancel.is_cancelled() {
                break;
            }
            let destinations = match account.client.list_destinations().await {
                Ok(destinations) => destinations,
                Err(e) => {
                    ctx.skip_account(account, &e, &mut result).await;
                    continue;
                }
            };

            let chosen = pick_content(&content, ctx.config.breadth, cycle, index);
            for destination in destinations.into_iter().filter(|d| d.accepts_broadcast()) {
                for item in &chosen {
                    items.push(WorkItem::content(
                        account.credential.id,
                        &account.credential.label,
                        (*item).clone(),
                        destination.clone(),
                    ));
                }
            }
        }

        tracing::debug!(items = items.len(), accounts = connected.len(), "Distribution planned");

        let clients = client_map(&connected);
        let outcome = ctx
            .fan_out(items, |item| {
                let client = clients.get(&item.account_id).cloned();
                async move {
                    let client = client.ok_or_else(|| ClientError::Connection("no live session".into()))?;
                    let (Payload::Content(piece), Some(destination)) = (&item.payload, &item.destination) else {
                        return Err(ClientError::Other("not a content item".into()));
                    };
                    client.send_content(destination, &piece.to_outgoing()).await?;
                    Ok("sent".to_string())
                }
            })
            .await;
        result.merge(outcome);

        if ctx.config.recycle_sessions {
            ctx.pool.clear_all().await;
        }

        Ok(CycleStatus::Completed(result))
    }
}
