//! Job kinds and task lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five automation behaviours a tenant can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Mass content distribution to joined destinations
    Distribute,
    /// Joining pending target channels
    Join,
    /// Unconditional reply to private messages
    PrivateReply,
    /// Trigger-matched reply in groups
    GroupReply,
    /// Probabilistic reply in groups
    RandomReply,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::Distribute,
        JobKind::Join,
        JobKind::PrivateReply,
        JobKind::GroupReply,
        JobKind::RandomReply,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Distribute => "distribute",
            JobKind::Join => "join",
            JobKind::PrivateReply => "private-reply",
            JobKind::GroupReply => "group-reply",
            JobKind::RandomReply => "random-reply",
        }
    }

    /// Returns true for the three auto-reply kinds
    pub fn is_reply(&self) -> bool {
        matches!(self, JobKind::PrivateReply | JobKind::GroupReply | JobKind::RandomReply)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown job kind: {}", s))
    }
}

/// Lifecycle of a (tenant, kind) task handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// No loop running; can be started
    Idle,
    /// Loop is running
    Running,
    /// Cancellation signalled, waiting for the loop to exit
    Stopping,
}

impl TaskState {
    /// Returns true if `start` may launch a new loop from this state
    pub fn can_start(&self) -> bool {
        matches!(self, TaskState::Idle)
    }
}
