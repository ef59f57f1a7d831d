//! Account session management
//!
//! Owns live account connections shared by every job loop in the process.

mod pool;

pub use pool::{AccountSessionPool, DEFAULT_HANDSHAKE_TIMEOUT};
