//! Auto-reply jobs.
//!
//! One behavior serves all three reply kinds; they differ in which
//! destinations they scan and how a rule is chosen for a message:
//!
//! | kind          | destinations | rule selection                          |
//! |---------------|--------------|-----------------------------------------|
//! | private-reply | private      | first active rule, latest message only  |
//! | group-reply   | groups       | first rule whose trigger matches        |
//! | random-reply  | groups       | first rule, if the message wins the flip |
//!
//! Rules are evaluated in configured order and the first match wins, so an
//! inbound message is answered at most once. A message is remembered once it
//! is answered, fails permanently, or matches no rule. A reply that was not
//! sent, or failed with a retryable error, is planned again next cycle.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::Rng;

use super::job_loop::{CycleStatus, JobBehavior, JobContext, client_map};
use crate::domain::{CycleResult, DestinationKind, InboundMessage, JobKind, Payload, ReplyRule, WorkItem};
use crate::error::Result;
use crate::network::ClientError;
use crate::scheduler::BackoffController;

/// Answered messages remembered per loop
const SEEN_CAPACITY: usize = 10_000;

/// (account, destination, message)
type MessageKey = (u64, i64, u64);

/// Bounded memory of messages already handled
#[derive(Debug, Default)]
struct SeenMessages {
    set: HashSet<MessageKey>,
    order: VecDeque<MessageKey>,
}

impl SeenMessages {
    fn contains(&self, key: &MessageKey) -> bool {
        self.set.contains(key)
    }

    fn insert(&mut self, key: MessageKey) {
        if !self.set.insert(key) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > SEEN_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.set.len()
    }
}

pub struct ReplyJob {
    kind: JobKind,
    seen: SeenMessages,
}

impl ReplyJob {
    /// Reply behavior for one of the reply kinds
    pub fn new(kind: JobKind) -> Self {
        debug_assert!(kind.is_reply());
        Self {
            kind,
            seen: SeenMessages::default(),
        }
    }

    fn scans(&self, kind: DestinationKind) -> bool {
        match self.kind {
            JobKind::PrivateReply => kind == DestinationKind::Private,
            _ => kind == DestinationKind::Group,
        }
    }
}

/// First rule (in configured order) that answers `message`.
///
/// Random replies flip one coin per message, not per rule.
fn select_rule<'a, R: Rng + ?Sized>(
    kind: JobKind,
    rules: &'a [ReplyRule],
    message: &InboundMessage,
    probability: f64,
    rng: &mut R,
) -> Option<&'a ReplyRule> {
    match kind {
        JobKind::GroupReply => rules.iter().find(|rule| rule.trigger_matches(&message.text)),
        JobKind::RandomReply if rng.random_bool(probability) => rules.first(),
        JobKind::RandomReply => None,
        _ => rules.first(),
    }
}

fn settle(settled: &Mutex<Vec<MessageKey>>, key: MessageKey) {
    settled.lock().unwrap_or_else(PoisonError::into_inner).push(key);
}

#[async_trait]
impl JobBehavior for ReplyJob {
    async fn run_cycle(&mut self, ctx: &JobContext, _cycle: u64) -> Result<CycleStatus> {
        let accounts = ctx.store.list_eligible_accounts(&ctx.tenant).await?;
        if accounts.is_empty() {
            return Ok(CycleStatus::Idle("no eligible accounts".into()));
        }
        let rules = ctx.store.list_reply_rules(&ctx.tenant, self.kind).await?;
        if rules.is_empty() {
            return Ok(CycleStatus::Idle("no reply rules".into()));
        }

        let mut result = CycleResult::new();
        let connected = ctx.connect_accounts(&accounts, &mut result).await;

        let mut items = Vec::new();
        'accounts: for account in &connected {
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

            let scanned: Vec<_> = destinations.into_iter().filter(|d| self.scans(d.kind)).collect();
            for destination in scanned {
                let mut messages = match account
                    .client
                    .list_recent_inbound(&destination, ctx.config.inbound_limit)
                    .await
                {
                    Ok(messages) => messages,
                    Err(e) => {
                        ctx.skip_account(account, &e, &mut result).await;
                        continue 'accounts;
                    }
                };
                messages.retain(|m| !m.outgoing && !self.seen.contains(&(account.credential.id, destination.id, m.id)));
                messages.sort_by_key(|m| m.sent_at);

                // A private conversation gets one answer, to its latest message
                if self.kind == JobKind::PrivateReply && messages.len() > 1 {
                    for older in messages.drain(..messages.len() - 1) {
                        self.seen.insert((account.credential.id, destination.id, older.id));
                    }
                }

                for message in messages {
                    let key = (account.credential.id, destination.id, message.id);
                    let picked = select_rule(
                        self.kind,
                        &rules,
                        &message,
                        ctx.config.reply_probability,
                        &mut rand::rng(),
                    );
                    let Some(rule) = picked else {
                        self.seen.insert(key);
                        continue;
                    };
                    items.push(WorkItem::reply(
                        account.credential.id,
                        &account.credential.label,
                        destination.clone(),
                        message.id,
                        rule.id,
                        rule.to_reply(message.id),
                    ));
                }
            }
        }

        tracing::debug!(items = items.len(), remembered = self.seen.len(), "Replies planned");

        // Messages whose reply went out or can never go out
        let settled = Mutex::new(Vec::new());
        let clients = client_map(&connected);
        let (clients, settled_keys) = (&clients, &settled);
        let outcome = ctx
            .fan_out(items, move |item| {
                let client = clients.get(&item.account_id).cloned();
                async move {
                    let client = client.ok_or_else(|| ClientError::Connection("no live session".into()))?;
                    let (Payload::Reply { message_id, message, .. }, Some(destination)) =
                        (&item.payload, &item.destination)
                    else {
                        return Err(ClientError::Other("not a reply item".into()));
                    };
                    let key = (item.account_id, destination.id, *message_id);
                    match client.send_content(destination, message).await {
                        Ok(()) => {
                            settle(settled_keys, key);
                            Ok("replied".to_string())
                        }
                        Err(err) => {
                            if !BackoffController::classify(&err).is_retryable() {
                                settle(settled_keys, key);
                            }
                            Err(err)
                        }
                    }
                }
            })
            .await;
        result.merge(outcome);

        for key in settled.into_inner().unwrap_or_else(PoisonError::into_inner) {
            self.seen.insert(key);
        }

        Ok(CycleStatus::Completed(result))
    }
}
