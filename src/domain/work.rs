//! Per-cycle work units and their aggregate outcome.

use super::records::{ContentItem, Destination, OutgoingMessage, Target};

/// What one fan-out attempt does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Send a content item to the destination
    Content(ContentItem),
    /// Join the target
    Join(Target),
    /// Answer an inbound message in the destination
    Reply {
        message_id: u64,
        rule_id: u64,
        message: OutgoingMessage,
    },
}

/// A single (account, content-or-target, destination) attempt.
///
/// Constructed per cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub account_id: u64,
    pub account_label: String,
    pub payload: Payload,
    /// Where the payload goes; `None` for joins
    pub destination: Option<Destination>,
}

impl WorkItem {
    pub fn content(account_id: u64, account_label: &str, item: ContentItem, destination: Destination) -> Self {
        Self {
            account_id,
            account_label: account_label.to_string(),
            payload: Payload::Content(item),
            destination: Some(destination),
        }
    }

    pub fn join(account_id: u64, account_label: &str, target: Target) -> Self {
        Self {
            account_id,
            account_label: account_label.to_string(),
            payload: Payload::Join(target),
            destination: None,
        }
    }

    pub fn reply(
        account_id: u64,
        account_label: &str,
        destination: Destination,
        message_id: u64,
        rule_id: u64,
        message: OutgoingMessage,
    ) -> Self {
        Self {
            account_id,
            account_label: account_label.to_string(),
            payload: Payload::Reply {
                message_id,
                rule_id,
                message,
            },
            destination: Some(destination),
        }
    }

    /// Short human-readable description for outcome notes
    pub fn describe(&self) -> String {
        let what = match &self.payload {
            Payload::Content(item) => format!("content #{}", item.id),
            Payload::Join(target) => format!("join {}", target.link),
            Payload::Reply { message_id, rule_id, .. } => format!("reply rule #{} to msg {}", rule_id, message_id),
        };
        match &self.destination {
            Some(dest) => format!("{} -> {} ({})", self.account_label, dest.title, what),
            None => format!("{} ({})", self.account_label, what),
        }
    }
}

/// Aggregate outcome of one job cycle.
///
/// `attempted == succeeded + failed` always holds; skipped accounts and
/// cancelled items are not attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleResult {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures classified as rate limits (subset of `failed`)
    pub rate_limited: usize,
    /// Accounts skipped because no connection could be acquired
    pub skipped_accounts: usize,
    /// Operator-visible outcome lines
    pub notes: Vec<String>,
}

impl CycleResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, note: impl Into<String>) {
        self.attempted += 1;
        self.succeeded += 1;
        self.notes.push(note.into());
    }

    pub fn record_failure(&mut self, note: impl Into<String>) {
        self.attempted += 1;
        self.failed += 1;
        self.notes.push(note.into());
    }

    pub fn record_rate_limited(&mut self, note: impl Into<String>) {
        self.rate_limited += 1;
        self.record_failure(note);
    }

    pub fn record_skipped_account(&mut self, note: impl Into<String>) {
        self.skipped_accounts += 1;
        self.notes.push(note.into());
    }

    /// Fold another result (e.g. a later join round) into this one
    pub fn merge(&mut self, other: CycleResult) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.rate_limited += other.rate_limited;
        self.skipped_accounts += other.skipped_accounts;
        self.notes.extend(other.notes);
    }

    pub fn is_consistent(&self) -> bool {
        self.attempted == self.succeeded + self.failed
    }
}
