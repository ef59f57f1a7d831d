//! Autopilot - per-tenant messaging automation orchestrator
//!
//! Runs long-lived job loops (distribution, joining, auto-replies) for many
//! tenants over a shared pool of account connections, absorbing provider rate
//! limits per account and guaranteeing at most one loop per (tenant, kind).

pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod jobs;
pub mod manager;
pub mod network;
pub mod orchestrator;
pub mod scheduler;
pub mod session;
pub mod storage;

pub use error::{AutopilotError, Result};
pub use orchestrator::Orchestrator;
