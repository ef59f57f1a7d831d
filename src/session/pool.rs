//! Account session pool.
//!
//! Caches one live connection per account and hands out shared references.
//! Several job loops of the same tenant may use one connection at once; the
//! pool only guards its own map against concurrent insert/evict.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::domain::AccountCredential;
use crate::network::{ClientError, ClientFactory, NetworkClient};
use crate::scheduler::SessionEvictor;

/// Default bound on connect + authorization check.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// One cached connection
struct AccountSession {
    /// Session string the connection was opened with
    session: String,
    label: String,
    client: Arc<dyn NetworkClient>,
    last_used: Instant,
}

/// Lazily-connecting cache of account connections
pub struct AccountSessionPool {
    factory: Arc<dyn ClientFactory>,
    handshake_timeout: Duration,
    sessions: Mutex<HashMap<u64, AccountSession>>,
}

impl AccountSessionPool {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Return the cached connection for the account, or establish one.
    ///
    /// Returns `None` when the handshake fails or the session is not
    /// authorized; the account stays in the store and is retried next cycle.
    pub async fn acquire(&self, credential: &AccountCredential) -> Option<Arc<dyn NetworkClient>> {
        let stale = {
            let mut sessions = self.lock();
            match sessions.get_mut(&credential.id) {
                Some(entry) if entry.session == credential.session => {
                    entry.last_used = Instant::now();
                    return Some(entry.client.clone());
                }
                // Credential was replaced in the store since we connected
                Some(_) => sessions.remove(&credential.id),
                None => None,
            }
        };
        if let Some(stale) = stale {
            stale.client.disconnect().await;
        }

        let client = self.factory.create(credential);
        match tokio::time::timeout(self.handshake_timeout, handshake(client.as_ref())).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                tracing::warn!(account = %credential.label, "Session not authorized, skipping account");
                client.disconnect().await;
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(account = %credential.label, error = %e, "Handshake failed, skipping account");
                client.disconnect().await;
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    account = %credential.label,
                    timeout_ms = self.handshake_timeout.as_millis() as u64,
                    "Handshake timed out, skipping account"
                );
                client.disconnect().await;
                return None;
            }
        }

        // Another loop may have connected the same account while we were in the handshake
        let (winner, loser) = {
            let mut sessions = self.lock();
            match sessions.get_mut(&credential.id) {
                Some(existing) => {
                    existing.last_used = Instant::now();
                    (existing.client.clone(), Some(client))
                }
                None => {
                    sessions.insert(
                        credential.id,
                        AccountSession {
                            session: credential.session.clone(),
                            label: credential.label.clone(),
                            client: client.clone(),
                            last_used: Instant::now(),
                        },
                    );
                    (client, None)
                }
            }
        };
        if let Some(loser) = loser {
            loser.disconnect().await;
        }

        tracing::debug!(account = %credential.label, "Session established");
        Some(winner)
    }

    /// Close and evict the account's connection; the next `acquire` reconnects.
    pub async fn release_on_error(&self, account_id: u64) {
        let removed = self.lock().remove(&account_id);
        if let Some(session) = removed {
            tracing::info!(account = %session.label, "Evicting session after connection error");
            session.client.disconnect().await;
        }
    }

    /// Close every cached connection
    pub async fn clear_all(&self) {
        let drained: Vec<AccountSession> = self.lock().drain().map(|(_, s)| s).collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "Clearing session pool");
        }
        for session in drained {
            session.client.disconnect().await;
        }
    }

    /// Number of cached connections
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, account_id: u64) -> bool {
        self.lock().contains_key(&account_id)
    }

    /// Time since the account's connection was last handed out
    pub fn idle_for(&self, account_id: u64) -> Option<Duration> {
        self.lock().get(&account_id).map(|s| s.last_used.elapsed())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, AccountSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn handshake(client: &dyn NetworkClient) -> Result<bool, ClientError> {
    client.connect().await?;
    client.is_authorized().await
}

#[async_trait]
impl SessionEvictor for AccountSessionPool {
    async fn evict(&self, account_id: u64) {
        self.release_on_error(account_id).await;
    }
}
