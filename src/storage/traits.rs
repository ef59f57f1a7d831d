//! Store trait definition.
//!
//! The store owns accounts, content, targets and reply rules. Job loops only
//! read from it, apart from the idempotent target status update.

use async_trait::async_trait;

use crate::domain::{AccountCredential, ContentItem, JobKind, ReplyRule, Target, TargetStatus, TenantId};
use crate::error::Result;

/// Read-mostly record store scoped by tenant.
#[async_trait]
pub trait Store: Send + Sync {
    /// Active accounts the tenant may use (own and shared).
    async fn list_eligible_accounts(&self, tenant: &TenantId) -> Result<Vec<AccountCredential>>;

    /// Content items the tenant distributes, in configured order.
    async fn list_content(&self, tenant: &TenantId) -> Result<Vec<ContentItem>>;

    /// Targets still waiting to be joined, in configured order.
    async fn list_pending_targets(&self, tenant: &TenantId) -> Result<Vec<Target>>;

    /// Active reply rules of one kind, in configured order.
    async fn list_reply_rules(&self, tenant: &TenantId, kind: JobKind) -> Result<Vec<ReplyRule>>;

    /// Set a target's status. Re-setting the same status is harmless.
    async fn mark_target_status(&self, target_id: u64, status: TargetStatus) -> Result<()>;
}
