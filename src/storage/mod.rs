//! Storage layer for Autopilot.
//!
//! The record store is an external collaborator; this module defines its
//! contract ([`Store`]) plus an in-memory implementation and a YAML fixture
//! loader for running without a database.

mod fixture;
mod memory;
mod traits;

pub use fixture::StoreFixture;
pub use memory::{MemoryStore, StoreData};
pub use traits::Store;
