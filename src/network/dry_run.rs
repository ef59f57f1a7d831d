//! Dry-run network client.
//!
//! Logs every operation instead of touching a real network. Used by the
//! `autopilot run` command to exercise job loops against fixture data.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::client::{ClientError, ClientFactory, NetworkClient};
use crate::domain::{AccountCredential, Destination, InboundMessage, OutgoingMessage, Target};

/// Client that logs instead of sending
pub struct DryRunClient {
    account: String,
    authorized: bool,
    destinations: Vec<Destination>,
}

#[async_trait]
impl NetworkClient for DryRunClient {
    async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!(account = %self.account, "dry-run connect");
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, ClientError> {
        Ok(self.authorized)
    }

    async fn disconnect(&self) {
        tracing::debug!(account = %self.account, "dry-run disconnect");
    }

    async fn send_content(&self, destination: &Destination, message: &OutgoingMessage) -> Result<(), ClientError> {
        tracing::info!(
            account = %self.account,
            destination = %destination.title,
            media = message.media.is_some(),
            reply_to = ?message.reply_to,
            "dry-run send: {}",
            message.text
        );
        Ok(())
    }

    async fn list_recent_inbound(
        &self,
        _destination: &Destination,
        _limit: usize,
    ) -> Result<Vec<InboundMessage>, ClientError> {
        Ok(Vec::new())
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>, ClientError> {
        Ok(self.destinations.clone())
    }

    async fn join(&self, target: &Target) -> Result<(), ClientError> {
        tracing::info!(account = %self.account, target = %target.link, "dry-run join");
        Ok(())
    }
}

/// Factory for [`DryRunClient`]s with per-account destination lists
#[derive(Debug, Default, Clone)]
pub struct DryRunFactory {
    destinations: HashMap<u64, Vec<Destination>>,
}

impl DryRunFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destinations(destinations: HashMap<u64, Vec<Destination>>) -> Self {
        Self { destinations }
    }
}

impl ClientFactory for DryRunFactory {
    fn create(&self, credential: &AccountCredential) -> Arc<dyn NetworkClient> {
        Arc::new(DryRunClient {
            account: credential.label.clone(),
            authorized: !credential.session.trim().is_empty(),
            destinations: self.destinations.get(&credential.id).cloned().unwrap_or_default(),
        })
    }
}
