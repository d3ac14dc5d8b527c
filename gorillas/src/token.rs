//! Persisted bearer token: the single source of truth for "is logged in".

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::error::{GorillasError, Result};
use crate::storage::{keys, Storage};

/// Process-wide session token backed by durable storage.
///
/// Reads always go to storage, so token presence is re-derived on every start.
/// Changes are announced on a `watch` channel.
#[derive(Debug, Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
    tx: Arc<watch::Sender<Option<String>>>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let current = read_token(storage.as_ref());
        let (tx, _) = watch::channel(current);
        Self {
            storage,
            tx: Arc::new(tx),
        }
    }

    /// The current token, if any.
    pub fn get(&self) -> Option<String> {
        read_token(self.storage.as_ref())
    }

    pub fn is_logged_in(&self) -> bool {
        self.get().is_some()
    }

    /// Persist a new token, replacing any previous one.
    pub fn set(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(GorillasError::PreconditionFailed("empty session token".into()));
        }
        self.storage.set(keys::AUTH_TOKEN, token)?;
        self.tx.send_replace(Some(token.to_string()));
        info!("session token stored");
        Ok(())
    }

    /// Remove the token. Idempotent; returns whether a token was present.
    pub fn clear(&self) -> Result<bool> {
        let had_token = self.get().is_some();
        self.storage.remove(keys::AUTH_TOKEN)?;
        if had_token {
            self.tx.send_replace(None);
            info!("session token cleared");
        }
        Ok(had_token)
    }

    /// Subscribe to token changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

fn read_token(storage: &dyn Storage) -> Option<String> {
    if !storage.is_available() {
        return None;
    }
    storage.get(keys::AUTH_TOKEN).filter(|t| !t.is_empty())
}
