//! Credential storage
//!
//! The token store is the single owner of persisted credentials. The HTTP
//! client reads from it on every request and writes to it only through the
//! refresh protocol; it never caches tokens between requests.
//!
//! Two implementations are provided: [`MemoryTokenStore`] for tests and
//! short-lived processes, and [`FileTokenStore`] for persistence across app
//! restarts.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::types::{SessionContext, TokenSet};

/// Error type for token store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying persistence failed (file I/O, platform storage)
    #[error("storage error: {0}")]
    Storage(String),

    /// Stored credentials could not be decoded
    #[error("corrupt credential data: {0}")]
    Corrupt(String),
}

/// Persisted credential storage consumed by the API client.
///
/// Implementations may be backed by memory, files, or platform keychains.
/// All access goes through `async` methods so asynchronous backends can be
/// plugged in without changing call sites.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Current token set, if authenticated.
    async fn token_set(&self) -> Option<TokenSet>;

    /// Current session identifiers, if any.
    async fn session(&self) -> Option<SessionContext>;

    /// Replace the stored token set wholesale.
    ///
    /// # Errors
    /// Returns an error when persistence fails.
    async fn store_tokens(&self, tokens: &TokenSet) -> Result<(), StoreError>;

    /// Replace the stored session identifiers.
    ///
    /// # Errors
    /// Returns an error when persistence fails.
    async fn store_session(&self, session: &SessionContext) -> Result<(), StoreError>;

    /// Remove all persisted credentials (tokens and session).
    ///
    /// # Errors
    /// Returns an error when deletion fails.
    async fn clear_all(&self) -> Result<(), StoreError>;

    /// Current access token, if authenticated.
    async fn access_token(&self) -> Option<String> {
        self.token_set().await.map(|t| t.access_token)
    }

    /// Current refresh token, if authenticated.
    async fn refresh_token(&self) -> Option<String> {
        self.token_set().await.and_then(|t| t.refresh_token)
    }

    /// Whether the stored access token is expired or will expire within the
    /// given threshold. `false` when no tokens are stored.
    async fn is_token_expired(&self, threshold_seconds: i64) -> bool {
        match self.token_set().await {
            Some(tokens) => tokens.is_expired(threshold_seconds),
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct CredentialState {
    tokens: Option<TokenSet>,
    session: Option<SessionContext>,
}

/// In-memory token store.
///
/// Credentials live only for the lifetime of the process. Cloning yields a
/// handle to the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    state: Arc<Mutex<CredentialState>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn token_set(&self) -> Option<TokenSet> {
        self.state.lock().tokens.clone()
    }

    async fn session(&self) -> Option<SessionContext> {
        self.state.lock().session.clone()
    }

    async fn store_tokens(&self, tokens: &TokenSet) -> Result<(), StoreError> {
        self.state.lock().tokens = Some(tokens.clone());
        Ok(())
    }

    async fn store_session(&self, session: &SessionContext) -> Result<(), StoreError> {
        self.state.lock().session = Some(session.clone());
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.tokens = None;
        state.session = None;
        Ok(())
    }
}

/// On-disk serialized shape of [`FileTokenStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedCredentials {
    tokens: Option<TokenSet>,
    session: Option<SessionContext>,
}

/// File-backed token store.
///
/// Credentials are written as a single JSON document. Reads go to disk on
/// every call so external writers (logout from another component) are picked
/// up immediately.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store backed by the given file path. The file is created on
    /// first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<PersistedCredentials, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(PersistedCredentials::default())
            }
            Err(e) => Err(StoreError::Storage(e.to_string())),
        }
    }

    async fn save(&self, credentials: &PersistedCredentials) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(credentials).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        tokio::fs::write(&self.path, bytes).await.map_err(|e| StoreError::Storage(e.to_string()))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn token_set(&self) -> Option<TokenSet> {
        self.load().await.ok().and_then(|c| c.tokens)
    }

    async fn session(&self) -> Option<SessionContext> {
        self.load().await.ok().and_then(|c| c.session)
    }

    async fn store_tokens(&self, tokens: &TokenSet) -> Result<(), StoreError> {
        let mut credentials = self.load().await.unwrap_or_default();
        credentials.tokens = Some(tokens.clone());
        self.save(&credentials).await
    }

    async fn store_session(&self, session: &SessionContext) -> Result<(), StoreError> {
        let mut credentials = self.load().await.unwrap_or_default();
        credentials.session = Some(session.clone());
        self.save(&credentials).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "credential file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Storage(e.to_string())),
        }
    }
}
