//! Task manager module
//!
//! Tracks which job loops run for which tenant and guarantees at most one
//! loop per (tenant, kind).

mod task_registry;

pub use task_registry::{DEFAULT_STOP_GRACE, TaskRegistry};
