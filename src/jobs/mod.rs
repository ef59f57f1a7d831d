//! Job loops
//!
//! One generic [`JobLoop`] drives a per-kind [`JobBehavior`]:
//! - DistributeJob: sends content to every group/channel of every account
//! - JoinJob: spreads pending targets over accounts until each is joined
//! - ReplyJob: answers inbound messages (private, group trigger, random)

mod distribute;
mod job_loop;
mod join;
mod reply;

pub use distribute::DistributeJob;
pub use job_loop::{ConnectedAccount, CycleStatus, JobBehavior, JobContext, JobLoop, LoopSummary, client_map};
pub use join::JoinJob;
pub use reply::ReplyJob;

use crate::domain::JobKind;

/// The behavior that implements a job kind
pub fn behavior_for(kind: JobKind) -> Box<dyn JobBehavior> {
    match kind {
        JobKind::Distribute => Box::new(DistributeJob::new()),
        JobKind::Join => Box::new(JoinJob::new()),
        JobKind::PrivateReply | JobKind::GroupReply | JobKind::RandomReply => Box::new(ReplyJob::new(kind)),
    }
}
