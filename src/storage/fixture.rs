//! YAML fixture files.
//!
//! A fixture describes store records plus the destinations each account can
//! see, so job loops can run end to end with the dry-run client.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::memory::{MemoryStore, StoreData};
use crate::domain::Destination;
use crate::error::Result;

/// Contents of a fixture file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreFixture {
    #[serde(flatten)]
    pub data: StoreData,
    /// Destinations per account id
    pub destinations: HashMap<u64, Vec<Destination>>,
}

impl StoreFixture {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Split into a store and the per-account destination map
    pub fn into_parts(self) -> (MemoryStore, HashMap<u64, Vec<Destination>>) {
        (MemoryStore::from_data(self.data), self.destinations)
    }
}
