//! In-memory store implementation.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::Store;
use crate::domain::{AccountCredential, ContentItem, JobKind, ReplyRule, Target, TargetStatus, TenantId};
use crate::error::{AutopilotError, Result};

/// All records held by a [`MemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreData {
    pub accounts: Vec<AccountCredential>,
    pub content: Vec<ContentItem>,
    pub targets: Vec<Target>,
    pub rules: Vec<ReplyRule>,
}

/// Store backed by vectors behind a lock; insertion order is configured order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: StoreData) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    pub fn add_account(&self, account: AccountCredential) -> Result<()> {
        self.write()?.accounts.push(account);
        Ok(())
    }

    pub fn add_content(&self, item: ContentItem) -> Result<()> {
        self.write()?.content.push(item);
        Ok(())
    }

    pub fn add_target(&self, target: Target) -> Result<()> {
        self.write()?.targets.push(target);
        Ok(())
    }

    pub fn add_rule(&self, rule: ReplyRule) -> Result<()> {
        self.write()?.rules.push(rule);
        Ok(())
    }

    /// Current status of a target, if it exists
    pub fn target_status(&self, target_id: u64) -> Result<Option<TargetStatus>> {
        Ok(self.read()?.targets.iter().find(|t| t.id == target_id).map(|t| t.status))
    }

    /// Copy of every record
    pub fn snapshot(&self) -> Result<StoreData> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreData>> {
        self.data.read().map_err(|e| AutopilotError::Store(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreData>> {
        self.data.write().map_err(|e| AutopilotError::Store(e.to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_eligible_accounts(&self, tenant: &TenantId) -> Result<Vec<AccountCredential>> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .filter(|a| a.active && tenant.can_use(&a.tenant))
            .cloned()
            .collect())
    }

    async fn list_content(&self, tenant: &TenantId) -> Result<Vec<ContentItem>> {
        Ok(self
            .read()?
            .content
            .iter()
            .filter(|c| tenant.can_use(&c.tenant))
            .cloned()
            .collect())
    }

    async fn list_pending_targets(&self, tenant: &TenantId) -> Result<Vec<Target>> {
        Ok(self
            .read()?
            .targets
            .iter()
            .filter(|t| t.status == TargetStatus::Pending && tenant.can_use(&t.tenant))
            .cloned()
            .collect())
    }

    async fn list_reply_rules(&self, tenant: &TenantId, kind: JobKind) -> Result<Vec<ReplyRule>> {
        Ok(self
            .read()?
            .rules
            .iter()
            .filter(|r| r.active && r.kind == kind && tenant.can_use(&r.tenant))
            .cloned()
            .collect())
    }

    async fn mark_target_status(&self, target_id: u64, status: TargetStatus) -> Result<()> {
        let mut data = self.write()?;
        match data.targets.iter_mut().find(|t| t.id == target_id) {
            Some(target) => {
                target.status = status;
                Ok(())
            }
            None => Err(AutopilotError::Store(format!("target {} not found", target_id))),
        }
    }
}
