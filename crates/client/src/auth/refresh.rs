//! Single-flight token refresh protocol
//!
//! At most one refresh request is outstanding per client at any time.
//! Concurrent callers (proactive pre-expiry refresh and 401 recovery alike)
//! converge on the same in-flight operation and observe the same outcome,
//! whether that is a fresh access token or `None`.
//!
//! The in-flight marker is checked and set under a synchronous lock before
//! any await point, which is what makes the mutual exclusion airtight under
//! cooperative scheduling.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::Shared;
use futures::FutureExt;
use parking_lot::Mutex;
use societyhub_domain::ApiResponse;
use tracing::{debug, info, warn};

use super::store::TokenStore;
use super::types::{RefreshData, RefreshRequest, TokenSet};

type RefreshFuture = Shared<Pin<Box<dyn Future<Output = Option<String>> + Send>>>;

/// Serializes refresh operations for one client instance.
///
/// Scoped to the client (and therefore process-wide when the application
/// constructs a single client at startup, which it should).
#[derive(Default)]
pub struct RefreshCoordinator {
    inflight: Arc<Mutex<Option<RefreshFuture>>>,
}

impl RefreshCoordinator {
    /// Create a coordinator with no refresh in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the refresh protocol, joining an in-flight operation when one
    /// exists.
    ///
    /// Returns the new access token, or `None` when the refresh failed and
    /// credentials were cleared.
    pub async fn refresh(&self, executor: RefreshExecutor) -> Option<String> {
        let operation = {
            let mut slot = self.inflight.lock();
            if let Some(existing) = slot.as_ref() {
                debug!("token refresh already in flight; awaiting shared outcome");
                existing.clone()
            } else {
                let marker = Arc::clone(&self.inflight);
                let future: Pin<Box<dyn Future<Output = Option<String>> + Send>> =
                    Box::pin(async move {
                        let outcome = executor.execute().await;
                        // Clear the marker when the operation settles so a
                        // later refresh can start fresh.
                        *marker.lock() = None;
                        outcome
                    });
                let shared = future.shared();
                *slot = Some(shared.clone());
                // Drive the operation to completion even if every awaiting
                // request gives up early (proactive callers are bounded by a
                // timeout and may stop polling).
                let _ = tokio::spawn(shared.clone());
                shared
            }
        };

        operation.await
    }

    /// Whether a refresh operation is currently outstanding.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inflight.lock().is_some()
    }
}

/// One concrete refresh attempt: the plain network call plus store mutation.
///
/// Built fresh for every invocation; the coordinator decides whether it
/// actually runs or an in-flight operation is joined instead.
pub struct RefreshExecutor {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<dyn TokenStore>,
}

impl RefreshExecutor {
    /// Create an executor targeting the given refresh endpoint.
    ///
    /// `http` must be a plain client without credential-attaching defaults;
    /// the refresh call itself is never authenticated.
    #[must_use]
    pub fn new(http: reqwest::Client, refresh_url: String, store: Arc<dyn TokenStore>) -> Self {
        Self { http, refresh_url, store }
    }

    /// Perform the refresh call.
    ///
    /// Resolves to the new access token on success. On any failure — missing
    /// refresh token, rejected request, unparseable response, persistence
    /// error — all stored credentials are cleared and `None` is returned.
    pub(crate) async fn execute(self) -> Option<String> {
        let Some(refresh_token) = self.store.refresh_token().await else {
            debug!("no refresh token available; treating as authentication failure");
            self.cleanup().await;
            return None;
        };

        let request = RefreshRequest { refresh_token };
        let response = match self.http.post(&self.refresh_url).json(&request).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "token refresh request failed");
                self.cleanup().await;
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "refresh endpoint rejected the refresh token");
            self.cleanup().await;
            return None;
        }

        let envelope: ApiResponse<RefreshData> = match response.json().await {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "failed to parse refresh response");
                self.cleanup().await;
                return None;
            }
        };

        if !envelope.success {
            warn!("refresh endpoint reported failure");
            self.cleanup().await;
            return None;
        }

        let expires_in = envelope.data.expires_in;
        let tokens =
            TokenSet::new(envelope.data.access_token, Some(envelope.data.refresh_token), expires_in);
        let access_token = tokens.access_token.clone();

        if let Err(err) = self.store.store_tokens(&tokens).await {
            warn!(error = %err, "failed to persist refreshed tokens");
            self.cleanup().await;
            return None;
        }

        info!(expires_in, "access token refreshed");
        Some(access_token)
    }

    /// Authentication-failure cleanup: clear every persisted credential.
    ///
    /// Best effort; a cleanup failure is logged and never masks the original
    /// error.
    async fn cleanup(&self) {
        match self.store.clear_all().await {
            Ok(()) => info!("cleared stored credentials after authentication failure"),
            Err(err) => {
                warn!(error = %err, "failed to clear credentials after authentication failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::store::MemoryTokenStore;

    fn executor(server_uri: &str, store: Arc<dyn TokenStore>) -> RefreshExecutor {
        RefreshExecutor::new(
            reqwest::Client::new(),
            format!("{}/auth/refresh", server_uri),
            store,
        )
    }

    fn refresh_success_body() -> serde_json::Value {
        serde_json::json!({
            "success": true,
            "data": {"accessToken": "at-2", "refreshToken": "rt-2", "expiresIn": 3600}
        })
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(refresh_success_body())
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        store
            .store_tokens(&TokenSet::new("at-1".to_string(), Some("rt-1".to_string()), 10))
            .await
            .unwrap();

        let coordinator = Arc::new(RefreshCoordinator::new());
        let (a, b, c) = tokio::join!(
            coordinator.refresh(executor(&server.uri(), Arc::clone(&store))),
            coordinator.refresh(executor(&server.uri(), Arc::clone(&store))),
            coordinator.refresh(executor(&server.uri(), Arc::clone(&store))),
        );

        assert_eq!(a.as_deref(), Some("at-2"));
        assert_eq!(b.as_deref(), Some("at-2"));
        assert_eq!(c.as_deref(), Some("at-2"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn sequential_refreshes_each_hit_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(refresh_success_body()))
            .expect(2)
            .mount(&server)
            .await;

        let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        store
            .store_tokens(&TokenSet::new("at-1".to_string(), Some("rt-1".to_string()), 10))
            .await
            .unwrap();

        let coordinator = RefreshCoordinator::new();
        let first = coordinator.refresh(executor(&server.uri(), Arc::clone(&store))).await;
        let second = coordinator.refresh(executor(&server.uri(), Arc::clone(&store))).await;

        assert_eq!(first.as_deref(), Some("at-2"));
        assert_eq!(second.as_deref(), Some("at-2"));
    }

    #[tokio::test]
    async fn refresh_rotates_the_stored_token_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(refresh_success_body()))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        store
            .store_tokens(&TokenSet::new("at-1".to_string(), Some("rt-1".to_string()), 10))
            .await
            .unwrap();

        let coordinator = RefreshCoordinator::new();
        let token = coordinator
            .refresh(executor(&server.uri(), Arc::clone(&store) as Arc<dyn TokenStore>))
            .await;

        assert_eq!(token.as_deref(), Some("at-2"));

        let stored = store.token_set().await.unwrap();
        assert_eq!(stored.access_token, "at-2");
        assert_eq!(stored.refresh_token.as_deref(), Some("rt-2"));
        let remaining = stored.seconds_until_expiry();
        assert!(remaining > 3590 && remaining <= 3600);
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_fast_and_clears_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(refresh_success_body()))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        store
            .store_session(&crate::auth::types::SessionContext {
                society_code: Some("SOC-042".to_string()),
                session_id: None,
            })
            .await
            .unwrap();

        let coordinator = RefreshCoordinator::new();
        let token = coordinator
            .refresh(executor(&server.uri(), Arc::clone(&store) as Arc<dyn TokenStore>))
            .await;

        assert!(token.is_none());
        // Cleanup wiped the session as well as the (absent) tokens
        assert!(store.session().await.is_none());
    }

    #[tokio::test]
    async fn rejected_refresh_clears_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        store
            .store_tokens(&TokenSet::new("at-1".to_string(), Some("rt-1".to_string()), 10))
            .await
            .unwrap();

        let coordinator = RefreshCoordinator::new();
        let token = coordinator
            .refresh(executor(&server.uri(), Arc::clone(&store) as Arc<dyn TokenStore>))
            .await;

        assert!(token.is_none());
        assert!(store.token_set().await.is_none());
    }
}
