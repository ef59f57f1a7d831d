//! Network client trait and error types
//!
//! One [`NetworkClient`] wraps one account's connection to the external
//! network. Implementations must tolerate interleaved calls from several job
//! loops sharing the same cached connection.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{AccountCredential, Destination, InboundMessage, OutgoingMessage, Target};

/// Per-account connection to the external network
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Open the connection (handshake)
    async fn connect(&self) -> Result<(), ClientError>;

    /// Whether the session is still logged in
    async fn is_authorized(&self) -> Result<bool, ClientError>;

    /// Close the connection; never fails
    async fn disconnect(&self);

    /// Send a message to a destination
    async fn send_content(&self, destination: &Destination, message: &OutgoingMessage) -> Result<(), ClientError>;

    /// Most recent messages in a destination, newest first
    async fn list_recent_inbound(
        &self,
        destination: &Destination,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, ClientError>;

    /// Conversations the account is a member of
    async fn list_destinations(&self) -> Result<Vec<Destination>, ClientError>;

    /// Join a target channel or group
    async fn join(&self, target: &Target) -> Result<(), ClientError>;
}

/// Builds (unconnected) clients for account credentials
pub trait ClientFactory: Send + Sync {
    fn create(&self, credential: &AccountCredential) -> Arc<dyn NetworkClient>;
}

/// Errors raised by network clients
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("Already a member of {0}")]
    AlreadyMember(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Session not authorized")]
    Unauthorized,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    pub fn rate_limited_secs(secs: u64) -> Self {
        ClientError::RateLimited {
            retry_after: Duration::from_secs(secs),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ClientError::RateLimited { .. })
    }

    /// Connection-level failures invalidate the cached session
    pub fn is_connection_level(&self) -> bool {
        matches!(self, ClientError::Connection(_) | ClientError::Unauthorized)
    }
}
