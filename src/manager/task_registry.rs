//! # Task registry - one job loop per (tenant, kind).
//!
//! ```text
//! start(tenant, kind, factory)
//!   ├─► lock registry
//!   ├─► handle Idle?  no ─► false
//!   ├─► spawn factory(child token)
//!   └─► state = Running ─► true
//!
//! stop(tenant, kind)
//!   ├─► lock registry
//!   ├─► handle Running?  no ─► false
//!   ├─► state = Stopping, cancel token, take join handle
//!   ├─► unlock, await loop exit (bounded by grace; abort after)
//!   └─► state = Idle ─► true
//! ```
//!
//! ## Rules
//! - A single registry-wide lock guards every handle; start/stop are rare
//! - Handles are never removed, only returned to Idle
//! - A loop that ended on its own (panic) is reaped back to Idle lazily

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::{JobKind, TaskState, TenantId};

/// Default bound on how long `stop` waits for a loop to exit
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

type TaskKey = (TenantId, JobKind);

/// Registry-owned state of one (tenant, kind)
struct TaskHandle {
    state: TaskState,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    fn idle() -> Self {
        Self {
            state: TaskState::Idle,
            cancel: CancellationToken::new(),
            join: None,
        }
    }

    /// Return a Running handle whose loop already exited to Idle
    fn reap(&mut self, key: &TaskKey) {
        if self.state != TaskState::Running {
            return;
        }
        if self.join.as_ref().is_some_and(|join| join.is_finished()) {
            tracing::warn!(tenant = %key.0, kind = %key.1, "Job loop exited without being stopped");
            self.state = TaskState::Idle;
            self.join = None;
        }
    }
}

/// Tracks which job kinds run for which tenant
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskKey, TaskHandle>>,
    stop_grace: Duration,
    root: CancellationToken,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_GRACE)
    }
}

impl TaskRegistry {
    pub fn new(stop_grace: Duration) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            stop_grace,
            root: CancellationToken::new(),
        }
    }

    pub fn stop_grace(&self) -> Duration {
        self.stop_grace
    }

    /// Launch a loop for (tenant, kind) unless one is already running.
    ///
    /// `loop_factory` receives the loop's cancellation token and is only
    /// called when this returns true.
    pub async fn start<F, Fut>(&self, tenant: &TenantId, kind: JobKind, loop_factory: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = (tenant.clone(), kind);
        let mut tasks = self.tasks.lock().await;
        let handle = tasks.entry(key.clone()).or_insert_with(TaskHandle::idle);
        handle.reap(&key);

        if !handle.state.can_start() {
            tracing::debug!(tenant = %tenant, kind = %kind, state = ?handle.state, "Start ignored");
            return false;
        }

        let cancel = self.root.child_token();
        let join = tokio::spawn(loop_factory(cancel.clone()));
        handle.state = TaskState::Running;
        handle.cancel = cancel;
        handle.join = Some(join);

        tracing::info!(tenant = %tenant, kind = %kind, "Job started");
        true
    }

    /// Stop the running loop for (tenant, kind).
    ///
    /// Waits up to the stop grace for the loop to reach a checkpoint, then
    /// aborts it. Returns false if nothing was running.
    pub async fn stop(&self, tenant: &TenantId, kind: JobKind) -> bool {
        let key = (tenant.clone(), kind);
        let join = {
            let mut tasks = self.tasks.lock().await;
            let Some(handle) = tasks.get_mut(&key) else {
                return false;
            };
            handle.reap(&key);
            if handle.state != TaskState::Running {
                return false;
            }
            handle.state = TaskState::Stopping;
            handle.cancel.cancel();
            handle.join.take()
        };

        if let Some(mut join) = join {
            match tokio::time::timeout(self.stop_grace, &mut join).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(tenant = %tenant, kind = %kind, error = %e, "Job loop ended abnormally");
                }
                Err(_) => {
                    tracing::warn!(
                        tenant = %tenant,
                        kind = %kind,
                        grace_ms = self.stop_grace.as_millis() as u64,
                        "Job loop did not stop within grace, aborting"
                    );
                    join.abort();
                }
            }
        }

        if let Some(handle) = self.tasks.lock().await.get_mut(&key) {
            handle.state = TaskState::Idle;
        }
        tracing::info!(tenant = %tenant, kind = %kind, "Job stopped");
        true
    }

    pub async fn is_running(&self, tenant: &TenantId, kind: JobKind) -> bool {
        self.state(tenant, kind).await == Some(TaskState::Running)
    }

    /// Current state, or `None` if (tenant, kind) was never started
    pub async fn state(&self, tenant: &TenantId, kind: JobKind) -> Option<TaskState> {
        let key = (tenant.clone(), kind);
        let mut tasks = self.tasks.lock().await;
        tasks.get_mut(&key).map(|handle| {
            handle.reap(&key);
            handle.state
        })
    }

    /// Kinds currently running for a tenant
    pub async fn running_kinds(&self, tenant: &TenantId) -> Vec<JobKind> {
        let mut tasks = self.tasks.lock().await;
        let mut kinds: Vec<JobKind> = tasks
            .iter_mut()
            .filter(|((owner, _), _)| owner == tenant)
            .filter_map(|(key, handle)| {
                handle.reap(key);
                (handle.state == TaskState::Running).then_some(key.1)
            })
            .collect();
        kinds.sort_unstable();
        kinds
    }

    /// Stop every running loop; returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let running: Vec<TaskKey> = {
            let mut tasks = self.tasks.lock().await;
            tasks
                .iter_mut()
                .filter_map(|(key, handle)| {
                    handle.reap(key);
                    (handle.state == TaskState::Running).then(|| key.clone())
                })
                .collect()
        };

        let stopped = join_all(running.iter().map(|(tenant, kind)| self.stop(tenant, *kind))).await;
        stopped.into_iter().filter(|stopped| *stopped).count()
    }
}
