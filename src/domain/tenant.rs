//! Tenant identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant id used for records every tenant may use (accounts registered before
/// any operator claimed them).
pub const SHARED_TENANT: &str = "0";

/// Opaque identifier for an operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The tenant that owns shared records.
    pub fn shared() -> Self {
        Self(SHARED_TENANT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_shared(&self) -> bool {
        self.0 == SHARED_TENANT
    }

    /// Whether a record owned by `owner` is visible to this tenant.
    pub fn can_use(&self, owner: &TenantId) -> bool {
        owner == self || owner.is_shared()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for TenantId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}
