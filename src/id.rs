//! ID generation utilities for Autopilot
//!
//! Provides identifiers used to correlate log lines of one job run and one cycle.

use rand::Rng;

use crate::domain::{JobKind, TenantId};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a run ID for one started job loop
///
/// Format: `run-{tenant}-{kind}-{timestamp_ms}-{random_hex}`
/// Example: `run-42-distribute-1738300800123-a1b2`
pub fn generate_run_id(tenant: &TenantId, kind: JobKind) -> String {
    let random: u16 = rand::rng().random();
    format!("run-{}-{}-{}-{:04x}", tenant, kind, now_ms(), random)
}

/// Generate a cycle ID within a run
///
/// Format: `{run_suffix}-c{cycle:05}`
/// Example: For run "run-42-join-1738300800123-a1b2" and cycle 7: "a1b2-c00007"
pub fn generate_cycle_id(run_id: &str, cycle: u64) -> String {
    let run_suffix = run_id.rsplit('-').next().unwrap_or(run_id);
    format!("{}-c{:05}", run_suffix, cycle)
}
