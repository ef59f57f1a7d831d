//! Records read from the store and exchanged with the network client.
//!
//! Every record the store hands out is a named structure so field order is
//! never load-bearing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::job::JobKind;
use super::tenant::TenantId;

/// Credential for one external account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredential {
    pub id: u64,
    /// Owning tenant ([`TenantId::shared`] for accounts usable by every tenant)
    pub tenant: TenantId,
    /// Opaque session string used to resume the account's login
    pub session: String,
    /// Display label (name or username) for logs
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl AccountCredential {
    pub fn new(id: u64, tenant: TenantId, session: impl Into<String>) -> Self {
        Self {
            id,
            tenant,
            session: session.into(),
            label: format!("account-{}", id),
            active: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

// Session strings are secrets; keep them out of logs.
impl fmt::Debug for AccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredential")
            .field("id", &self.id)
            .field("tenant", &self.tenant)
            .field("label", &self.label)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// A piece of content to distribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: u64,
    pub tenant: TenantId,
    pub text: String,
    /// Optional media attachment (photo, document)
    #[serde(default)]
    pub media: Option<PathBuf>,
}

impl ContentItem {
    pub fn text(id: u64, tenant: TenantId, text: impl Into<String>) -> Self {
        Self {
            id,
            tenant,
            text: text.into(),
            media: None,
        }
    }

    pub fn to_outgoing(&self) -> OutgoingMessage {
        OutgoingMessage {
            text: self.text.clone(),
            media: self.media.clone(),
            reply_to: None,
        }
    }
}

/// Join status of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Pending,
    Joined,
    Failed,
}

/// A channel or group to be joined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: u64,
    pub tenant: TenantId,
    /// Public link or invite link
    pub link: String,
    #[serde(default = "default_pending")]
    pub status: TargetStatus,
}

impl Target {
    pub fn pending(id: u64, tenant: TenantId, link: impl Into<String>) -> Self {
        Self {
            id,
            tenant,
            link: link.into(),
            status: TargetStatus::Pending,
        }
    }

    /// Returns true if the link is a private invite (`+hash` or `joinchat/hash`)
    pub fn is_invite(&self) -> bool {
        self.link.contains("/+") || self.link.contains("joinchat/")
    }
}

/// An auto-reply rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRule {
    pub id: u64,
    pub tenant: TenantId,
    pub kind: JobKind,
    /// Substring trigger (group replies); ignored by private and random replies
    #[serde(default)]
    pub trigger: Option<String>,
    pub text: String,
    #[serde(default)]
    pub media: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl ReplyRule {
    pub fn new(id: u64, tenant: TenantId, kind: JobKind, text: impl Into<String>) -> Self {
        Self {
            id,
            tenant,
            kind,
            trigger: None,
            text: text.into(),
            media: None,
            active: true,
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Case-insensitive substring match of the trigger against `text`.
    ///
    /// A rule without a (non-blank) trigger never matches.
    pub fn trigger_matches(&self, text: &str) -> bool {
        match self.trigger.as_deref().map(str::trim) {
            Some(trigger) if !trigger.is_empty() => text.to_lowercase().contains(&trigger.to_lowercase()),
            _ => false,
        }
    }

    pub fn to_reply(&self, reply_to: u64) -> OutgoingMessage {
        OutgoingMessage {
            text: self.text.clone(),
            media: self.media.clone(),
            reply_to: Some(reply_to),
        }
    }
}

/// Kind of conversation an account can see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    Private,
    Group,
    Channel,
}

/// A conversation an account is a member of
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub id: i64,
    pub title: String,
    pub kind: DestinationKind,
}

impl Destination {
    pub fn new(id: i64, title: impl Into<String>, kind: DestinationKind) -> Self {
        Self {
            id,
            title: title.into(),
            kind,
        }
    }

    /// Destinations content can be distributed to
    pub fn accepts_broadcast(&self) -> bool {
        matches!(self.kind, DestinationKind::Group | DestinationKind::Channel)
    }
}

/// A message read from a destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: u64,
    #[serde(default)]
    pub sender: Option<String>,
    pub text: String,
    /// Sent by the account itself
    #[serde(default)]
    pub outgoing: bool,
    pub sent_at: DateTime<Utc>,
}

/// A message to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    #[serde(default)]
    pub media: Option<PathBuf>,
    #[serde(default)]
    pub reply_to: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_pending() -> TargetStatus {
    TargetStatus::Pending
}
