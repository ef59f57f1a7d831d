//! External network layer
//!
//! This module provides:
//! - NetworkClient trait for one account's connection
//! - ClientFactory trait for building clients from credentials
//! - ClientError, the raw error every client raises
//! - DryRunFactory, a logging-only implementation

pub mod client;
pub mod dry_run;

pub use client::{ClientError, ClientFactory, NetworkClient};
pub use dry_run::{DryRunClient, DryRunFactory};
