//! Per-tenant automation orchestrator.
//!
//! The front-end facing surface: `start`, `stop` and `is_running` per
//! (tenant, kind), all returning plain booleans. Owns the task registry and
//! the state every job loop shares (session pool, backoff controller).

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::domain::{JobKind, TenantId};
use crate::error::{AutopilotError, Result};
use crate::jobs::{JobContext, JobLoop, behavior_for};
use crate::manager::TaskRegistry;
use crate::network::ClientFactory;
use crate::scheduler::BackoffController;
use crate::session::AccountSessionPool;
use crate::storage::Store;

/// Starts and stops job loops for tenants
pub struct Orchestrator {
    registry: TaskRegistry,
    store: Arc<dyn Store>,
    pool: Arc<AccountSessionPool>,
    backoff: Arc<BackoffController>,
    config: GlobalConfig,
}

impl Orchestrator {
    /// Build an orchestrator over `store`. Fails if `config` does not validate.
    pub fn new(config: GlobalConfig, store: Arc<dyn Store>, factory: Arc<dyn ClientFactory>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AutopilotError::Config(e.to_string()))?;

        let pool = AccountSessionPool::new(factory).with_handshake_timeout(config.sessions.handshake_timeout());
        Ok(Self {
            registry: TaskRegistry::new(config.registry.stop_grace()),
            store,
            pool: Arc::new(pool),
            backoff: Arc::new(BackoffController::new(config.backoff.to_backoff_config())),
            config,
        })
    }

    /// Start the `kind` loop for `tenant`. Returns false if it is already running.
    pub async fn start(&self, tenant: &TenantId, kind: JobKind) -> bool {
        let owner = tenant.clone();
        let job_config = self.config.job(kind);
        let store = self.store.clone();
        let pool = self.pool.clone();
        let backoff = self.backoff.clone();

        self.registry
            .start(tenant, kind, move |cancel| {
                let ctx = JobContext {
                    tenant: owner,
                    kind,
                    config: job_config,
                    store,
                    pool,
                    backoff,
                    cancel,
                };
                let job = JobLoop::new(ctx, behavior_for(kind));
                async move {
                    job.run().await;
                }
            })
            .await
    }

    /// Stop the `kind` loop for `tenant`. Returns false if it was not running.
    pub async fn stop(&self, tenant: &TenantId, kind: JobKind) -> bool {
        self.registry.stop(tenant, kind).await
    }

    pub async fn is_running(&self, tenant: &TenantId, kind: JobKind) -> bool {
        self.registry.is_running(tenant, kind).await
    }

    pub async fn running_kinds(&self, tenant: &TenantId) -> Vec<JobKind> {
        self.registry.running_kinds(tenant).await
    }

    /// Stop every loop and close every pooled session
    pub async fn shutdown(&self) -> usize {
        let stopped = self.registry.stop_all().await;
        self.pool.clear_all().await;
        tracing::info!(stopped, "Orchestrator shut down");
        stopped
    }

    pub fn pool(&self) -> &Arc<AccountSessionPool> {
        &self.pool
    }

    pub fn backoff(&self) -> &Arc<BackoffController> {
        &self.backoff
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }
}
