//! Shared test doubles for integration tests.
//!
//! `Recorder` is the fake network: every send and join is recorded with a
//! timestamp, and errors can be scripted per account or per target.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use autopilot::config::JobConfig;
use autopilot::domain::{
    AccountCredential, ContentItem, Destination, DestinationKind, InboundMessage, JobKind, OutgoingMessage, ReplyRule,
    Target, TenantId,
};
use autopilot::error::{AutopilotError, Result};
use autopilot::jobs::JobContext;
use autopilot::network::{ClientError, ClientFactory, NetworkClient};
use autopilot::scheduler::BackoffController;
use autopilot::session::AccountSessionPool;
use autopilot::storage::{MemoryStore, Store};

pub const TENANT: &str = "7";

pub fn tenant() -> TenantId {
    TenantId::new(TENANT)
}

/// One recorded send
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub account_id: u64,
    pub destination: i64,
    pub text: String,
    pub reply_to: Option<u64>,
    pub at: Instant,
}

/// One recorded join attempt
#[derive(Debug, Clone)]
pub struct JoinAttempt {
    pub account_id: u64,
    pub link: String,
    pub at: Instant,
}

#[derive(Default)]
pub struct Recorder {
    sends: Mutex<Vec<Dispatch>>,
    joins: Mutex<Vec<JoinAttempt>>,
    connects: Mutex<HashMap<u64, usize>>,
    destinations: Mutex<HashMap<u64, Vec<Destination>>>,
    inbound: Mutex<HashMap<i64, Vec<InboundMessage>>>,
    send_errors: Mutex<HashMap<u64, VecDeque<ClientError>>>,
    join_errors: Mutex<HashMap<(u64, String), ClientError>>,
    unauthorized: Mutex<HashSet<u64>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_destinations(&self, account_id: u64, destinations: Vec<Destination>) {
        self.destinations.lock().unwrap().insert(account_id, destinations);
    }

    pub fn set_inbound(&self, destination_id: i64, messages: Vec<InboundMessage>) {
        self.inbound.lock().unwrap().insert(destination_id, messages);
    }

    /// The account's next sends fail with these errors, in order
    pub fn fail_sends(&self, account_id: u64, errors: Vec<ClientError>) {
        self.send_errors
            .lock()
            .unwrap()
            .entry(account_id)
            .or_default()
            .extend(errors);
    }

    /// Every join of `link` by the account fails with `error`
    pub fn fail_join(&self, account_id: u64, link: &str, error: ClientError) {
        self.join_errors
            .lock()
            .unwrap()
            .insert((account_id, link.to_string()), error);
    }

    pub fn deny(&self, account_id: u64) {
        self.unauthorized.lock().unwrap().insert(account_id);
    }

    pub fn sends(&self) -> Vec<Dispatch> {
        self.sends.lock().unwrap().clone()
    }

    pub fn joins(&self) -> Vec<JoinAttempt> {
        self.joins.lock().unwrap().clone()
    }

    pub fn connects(&self, account_id: u64) -> usize {
        self.connects.lock().unwrap().get(&account_id).copied().unwrap_or(0)
    }
}

pub struct RecordingClient {
    account_id: u64,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl NetworkClient for RecordingClient {
    async fn connect(&self) -> std::result::Result<(), ClientError> {
        *self.recorder.connects.lock().unwrap().entry(self.account_id).or_default() += 1;
        Ok(())
    }

    async fn is_authorized(&self) -> std::result::Result<bool, ClientError> {
        Ok(!self.recorder.unauthorized.lock().unwrap().contains(&self.account_id))
    }

    async fn disconnect(&self) {}

    async fn send_content(
        &self,
        destination: &Destination,
        message: &OutgoingMessage,
    ) -> std::result::Result<(), ClientError> {
        let scripted = self
            .recorder
            .send_errors
            .lock()
            .unwrap()
            .get_mut(&self.account_id)
            .and_then(|errors| errors.pop_front());

        self.recorder.sends.lock().unwrap().push(Dispatch {
            account_id: self.account_id,
            destination: destination.id,
            text: message.text.clone(),
            reply_to: message.reply_to,
            at: Instant::now(),
        });

        match scripted {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn list_recent_inbound(
        &self,
        destination: &Destination,
        limit: usize,
    ) -> std::result::Result<Vec<InboundMessage>, ClientError> {
        let inbound = self.recorder.inbound.lock().unwrap();
        let messages = inbound.get(&destination.id).cloned().unwrap_or_default();
        Ok(messages.into_iter().rev().take(limit).collect())
    }

    async fn list_destinations(&self) -> std::result::Result<Vec<Destination>, ClientError> {
        Ok(self
            .recorder
            .destinations
            .lock()
            .unwrap()
            .get(&self.account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn join(&self, target: &Target) -> std::result::Result<(), ClientError> {
        self.recorder.joins.lock().unwrap().push(JoinAttempt {
            account_id: self.account_id,
            link: target.link.clone(),
            at: Instant::now(),
        });
        let scripted = self
            .recorder
            .join_errors
            .lock()
            .unwrap()
            .get(&(self.account_id, target.link.clone()))
            .cloned();
        match scripted {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct RecordingFactory {
    pub recorder: Arc<Recorder>,
}

impl RecordingFactory {
    pub fn new(recorder: Arc<Recorder>) -> Arc<Self> {
        Arc::new(Self { recorder })
    }
}

impl ClientFactory for RecordingFactory {
    fn create(&self, credential: &AccountCredential) -> Arc<dyn NetworkClient> {
        Arc::new(RecordingClient {
            account_id: credential.id,
            recorder: self.recorder.clone(),
        })
    }
}

/// Store whose reads fail a fixed number of times before delegating
pub struct FlakyStore {
    inner: MemoryStore,
    failures_left: AtomicUsize,
    pending_reads: AtomicUsize,
    failing_pending_read: Option<usize>,
}

impl FlakyStore {
    /// The first `failures` account listings fail
    pub fn new(inner: MemoryStore, failures: usize) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(failures),
            pending_reads: AtomicUsize::new(0),
            failing_pending_read: None,
        }
    }

    /// Only the `nth` (1-based) pending-target listing fails
    pub fn failing_pending_read(inner: MemoryStore, nth: usize) -> Self {
        Self {
            failing_pending_read: Some(nth),
            ..Self::new(inner, 0)
        }
    }

    fn check(&self) -> Result<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(AutopilotError::Store("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn list_eligible_accounts(&self, tenant: &TenantId) -> Result<Vec<AccountCredential>> {
        self.check()?;
        self.inner.list_eligible_accounts(tenant).await
    }

    async fn list_content(&self, tenant: &TenantId) -> Result<Vec<ContentItem>> {
        self.inner.list_content(tenant).await
    }

    async fn list_pending_targets(&self, tenant: &TenantId) -> Result<Vec<Target>> {
        let call = self.pending_reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_pending_read == Some(call) {
            return Err(AutopilotError::Store("read timed out".into()));
        }
        self.inner.list_pending_targets(tenant).await
    }

    async fn list_reply_rules(&self, tenant: &TenantId, kind: JobKind) -> Result<Vec<ReplyRule>> {
        self.inner.list_reply_rules(tenant, kind).await
    }

    async fn mark_target_status(&self, target_id: u64, status: autopilot::domain::TargetStatus) -> Result<()> {
        self.inner.mark_target_status(target_id, status).await
    }
}

pub fn account(id: u64) -> AccountCredential {
    AccountCredential::new(id, tenant(), format!("session-{}", id)).with_label(format!("acc{}", id))
}

pub fn group(id: i64) -> Destination {
    Destination::new(id, format!("group-{}", id), DestinationKind::Group)
}

pub fn private_chat(id: i64) -> Destination {
    Destination::new(id, format!("dm-{}", id), DestinationKind::Private)
}

pub fn inbound(id: u64, text: &str) -> InboundMessage {
    InboundMessage {
        id,
        sender: Some("stranger".into()),
        text: text.into(),
        outgoing: false,
        sent_at: Utc::now(),
    }
}

/// Job settings without pacing, with one cycle per hour
pub fn fast_config(kind: JobKind) -> JobConfig {
    JobConfig {
        item_pause: std::time::Duration::ZERO,
        cycle_interval: std::time::Duration::from_secs(3600),
        ..JobConfig::defaults_for(kind)
    }
}

/// A job context over `store` and the recorder's fake network
pub fn context(
    store: Arc<dyn Store>,
    recorder: &Arc<Recorder>,
    kind: JobKind,
    config: JobConfig,
    cancel: CancellationToken,
) -> JobContext {
    JobContext {
        tenant: tenant(),
        kind,
        config,
        store,
        pool: Arc::new(AccountSessionPool::new(RecordingFactory::new(recorder.clone()))),
        backoff: Arc::new(BackoffController::default()),
        cancel,
    }
}

/// Poll `condition` every 10ms (virtual time under a paused clock) up to `limit` checks
pub async fn wait_until<F: Fn() -> bool>(condition: F, limit: usize) -> bool {
    for _ in 0..limit {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}
