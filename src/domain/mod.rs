//! Domain types for Autopilot
//!
//! This module contains all core domain types:
//! - TenantId: The operator scope for accounts, content and targets
//! - JobKind / TaskState: Which automation behaviour and where its loop is in its lifecycle
//! - Records: Named structures read from the store (accounts, content, targets, rules)
//! - WorkItem / CycleResult: One fan-out attempt and the per-cycle tally

pub mod job;
pub mod records;
pub mod tenant;
pub mod work;

pub use job::{JobKind, TaskState};
pub use records::{
    AccountCredential, ContentItem, Destination, DestinationKind, InboundMessage, OutgoingMessage, ReplyRule, Target,
    TargetStatus,
};
pub use tenant::TenantId;
pub use work::{CycleResult, Payload, WorkItem};
