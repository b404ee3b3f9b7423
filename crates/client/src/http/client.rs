//! Authenticated HTTP client
//!
//! Wraps `reqwest` with automatic credential attachment, transparent
//! single-flight token refresh, a single bounded retry, and the uniform
//! error taxonomy of [`ClientError`]. Callers never see raw transport
//! errors.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use societyhub_domain::{extract_error_message, ApiResponse, ClientError, Result};
use tracing::{debug, warn};

use super::config::ApiClientConfig;
use crate::auth::refresh::{RefreshCoordinator, RefreshExecutor};
use crate::auth::store::TokenStore;

/// Per-call configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Override the configured timeout for this call only
    pub timeout: Option<Duration>,
}

/// One replayable piece of a multipart upload.
///
/// Parts are buffered in memory so the single automatic retry can rebuild
/// the form; streaming bodies cannot be replayed.
#[derive(Debug, Clone)]
pub struct UploadPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    content: UploadContent,
}

#[derive(Debug, Clone)]
enum UploadContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl UploadPart {
    /// A plain text form field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            content: UploadContent::Text(value.into()),
        }
    }

    /// A binary form field (file contents).
    #[must_use]
    pub fn bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            content: UploadContent::Bytes(bytes),
        }
    }

    /// Set the reported file name.
    #[must_use]
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Set the reported MIME type.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn to_part(&self) -> Result<reqwest::multipart::Part> {
        let mut part = match &self.content {
            UploadContent::Text(value) => reqwest::multipart::Part::text(value.clone()),
            UploadContent::Bytes(bytes) => reqwest::multipart::Part::bytes(bytes.clone()),
        };
        if let Some(file_name) = &self.file_name {
            part = part.file_name(file_name.clone());
        }
        if let Some(content_type) = &self.content_type {
            part = part.mime_str(content_type).map_err(|e| {
                ClientError::api(0, format!("invalid content type for part '{}': {e}", self.name))
            })?;
        }
        Ok(part)
    }
}

/// Request body, replayable across the single automatic retry.
enum Payload {
    None,
    Json(Value),
    Multipart(Vec<UploadPart>),
}

/// Immutable attempt counter threaded through the dispatch loop.
///
/// Each logical request is re-issued at most once, via either the 401
/// refresh path or the 5xx path, never both.
#[derive(Debug, Clone, Copy)]
struct Attempt(u8);

impl Attempt {
    fn first() -> Self {
        Self(1)
    }

    fn number(self) -> u8 {
        self.0
    }

    fn can_retry(self) -> bool {
        self.0 < 2
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// HTTP client for the SocietyHub REST API.
///
/// Construct one instance at application startup and share it (the type is
/// cheap to clone; clones share the refresh coordinator, which is what keeps
/// the single-flight guarantee process-wide).
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    plain_http: reqwest::Client,
    config: Arc<ApiClientConfig>,
    store: Arc<dyn TokenStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a client over the given configuration and credential store.
    ///
    /// # Errors
    /// Returns an error when the device identity contains values that cannot
    /// be carried in headers, or the underlying transport fails to build.
    pub fn new(config: ApiClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("X-Device-Platform", header_value(&config.device.platform)?);
        headers.insert("X-Device-ID", header_value(&config.device.device_id)?);
        headers.insert("X-App-Version", header_value(&config.device.app_version)?);

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::api(0, format!("failed to build HTTP client: {e}")))?;

        // Refresh calls go out plain: no credential or device defaults.
        let plain_http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::api(0, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            plain_http,
            config: Arc::new(config),
            store,
            refresh: Arc::new(RefreshCoordinator::new()),
        })
    }

    /// The credential store this client reads from and writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// `GET` a path and parse the response envelope.
    ///
    /// # Errors
    /// Fails with a [`ClientError`] per the response classification rules.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        self.request(Method::GET, path, None::<&()>, RequestOptions::default()).await
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    /// Fails with a [`ClientError`] per the response classification rules.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::POST, path, Some(body), RequestOptions::default()).await
    }

    /// `PUT` a JSON body.
    ///
    /// # Errors
    /// Fails with a [`ClientError`] per the response classification rules.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::PUT, path, Some(body), RequestOptions::default()).await
    }

    /// `PATCH` a JSON body.
    ///
    /// # Errors
    /// Fails with a [`ClientError`] per the response classification rules.
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>> {
        self.request(Method::PATCH, path, Some(body), RequestOptions::default()).await
    }

    /// `DELETE` a path.
    ///
    /// # Errors
    /// Fails with a [`ClientError`] per the response classification rules.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        self.request(Method::DELETE, path, None::<&()>, RequestOptions::default()).await
    }

    /// Issue a request with full control over method, body, and per-call
    /// overrides.
    ///
    /// # Errors
    /// Fails with a [`ClientError`] per the response classification rules.
    pub async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>> {
        let payload = match body {
            Some(body) => Payload::Json(serde_json::to_value(body).map_err(|e| {
                ClientError::api(0, format!("failed to serialize request body: {e}"))
            })?),
            None => Payload::None,
        };
        self.dispatch(method, path, payload, options).await
    }

    /// Upload a multipart form. Uses the upload timeout unless overridden.
    ///
    /// # Errors
    /// Fails with a [`ClientError`] per the response classification rules.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        parts: Vec<UploadPart>,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>> {
        self.dispatch(Method::POST, path, Payload::Multipart(parts), options).await
    }

    /// Core dispatch loop: build, send, classify, retry at most once.
    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut attempt = Attempt::first();

        loop {
            let request = self.build_request(&method, &url, &payload, &options).await?;
            debug!(attempt = attempt.number(), %method, %url, "sending request");

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    debug!(attempt = attempt.number(), %method, %url, error = %err, "transport failure");
                    return Err(classify_transport_error(&err));
                }
            };

            let status = response.status();
            debug!(
                attempt = attempt.number(),
                %method,
                %url,
                status = status.as_u16(),
                "received response"
            );

            if status.is_success() {
                return parse_envelope(response).await;
            }

            if status == StatusCode::UNAUTHORIZED && attempt.can_retry() {
                if self.refresh_access_token().await.is_some() {
                    attempt = attempt.next();
                    continue;
                }
                // Refresh failed; the refresh protocol already cleared the
                // stored credentials. Surface the original 401.
                let body = read_error_body(response).await;
                let message = extract_error_message(body.as_ref(), None);
                return Err(ClientError::api(401, message));
            }

            match status.as_u16() {
                403 => {
                    let body = read_error_body(response).await;
                    let message = extract_error_message(body.as_ref(), None);
                    let mut error = ClientError::forbidden(message);
                    if let Some(body) = body {
                        error = error.with_details(body);
                    }
                    return Err(error);
                }
                404 => {
                    let body = read_error_body(response).await;
                    let message = extract_error_message(body.as_ref(), None);
                    return Err(ClientError::not_found(message));
                }
                422 => {
                    let body = read_error_body(response).await;
                    let message = extract_error_message(body.as_ref(), None);
                    let mut error = ClientError::validation(message);
                    if let Some(body) = body {
                        error = error.with_details(body);
                    }
                    return Err(error);
                }
                code if (500..600).contains(&code) && attempt.can_retry() => {
                    warn!(
                        status = code,
                        delay = ?self.config.retry_delay,
                        "server error; retrying once"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt = attempt.next();
                }
                code => {
                    let body = read_error_body(response).await;
                    let message = extract_error_message(body.as_ref(), None);
                    return Err(ClientError::api(code, message));
                }
            }
        }
    }

    /// Assemble one attempt of a request: credentials, session headers, body.
    async fn build_request(
        &self,
        method: &Method,
        url: &str,
        payload: &Payload,
        options: &RequestOptions,
    ) -> Result<reqwest::RequestBuilder> {
        let mut builder = self.http.request(method.clone(), url);

        if let Some(token) = self.authorization_token().await {
            builder = builder.bearer_auth(token);
        }

        if let Some(session) = self.store.session().await {
            if let Some(society_code) = session.society_code {
                builder = builder.header("X-Society-Code", society_code);
            }
            if let Some(session_id) = session.session_id {
                builder = builder.header("X-Session-ID", session_id);
            }
        }

        let timeout = match payload {
            Payload::Multipart(_) => Some(options.timeout.unwrap_or(self.config.upload_timeout)),
            _ => options.timeout,
        };
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        match payload {
            Payload::None => Ok(builder),
            Payload::Json(value) => Ok(builder.json(value)),
            Payload::Multipart(parts) => {
                let mut form = reqwest::multipart::Form::new();
                for part in parts {
                    form = form.part(part.name.clone(), part.to_part()?);
                }
                Ok(builder.multipart(form))
            }
        }
    }

    /// Read the access token, refreshing proactively when it is near expiry.
    ///
    /// The wait on a proactive refresh is bounded by
    /// `proactive_refresh_wait`; on timeout or failure the request proceeds
    /// with the stored (possibly stale) token instead of blocking.
    async fn authorization_token(&self) -> Option<String> {
        let current = self.store.access_token().await;
        if current.is_none() {
            return None;
        }

        if self.store.is_token_expired(self.config.refresh_threshold_seconds).await {
            debug!("access token near expiry; refreshing proactively");
            let bounded = tokio::time::timeout(
                self.config.proactive_refresh_wait,
                self.refresh_access_token(),
            );
            match bounded.await {
                Ok(Some(token)) => return Some(token),
                Ok(None) => warn!("proactive refresh failed; continuing with stored token"),
                Err(_) => warn!("proactive refresh timed out; continuing with stored token"),
            }
        }

        current
    }

    /// Run the single-flight refresh protocol.
    async fn refresh_access_token(&self) -> Option<String> {
        let executor = RefreshExecutor::new(
            self.plain_http.clone(),
            self.config.refresh_url(),
            Arc::clone(&self.store),
        );
        self.refresh.refresh(executor).await
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ClientError::api(0, format!("invalid header value: {value}")))
}

/// Map a transport-level failure onto the error taxonomy.
///
/// Connection-level failures mean the request never reached the server and
/// classify as a network error; deadline overruns classify as timeouts;
/// everything else is surfaced generically with the transport message.
fn classify_transport_error(err: &reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::timeout();
    }
    if err.is_connect() {
        return ClientError::network();
    }
    ClientError::api(0, err.to_string())
}

async fn parse_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<ApiResponse<T>> {
    let status = response.status().as_u16();
    response
        .json::<ApiResponse<T>>()
        .await
        .map_err(|err| ClientError::api(status, format!("failed to parse response body: {err}")))
}

async fn read_error_body(response: reqwest::Response) -> Option<Value> {
    response.json::<Value>().await.ok()
}

#[cfg(test)]
mod tests {
    use societyhub_domain::ErrorCode;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::store::MemoryTokenStore;
    use crate::http::config::DeviceInfo;

    fn test_client(base_url: &str) -> ApiClient {
        let config = ApiClientConfig::builder(base_url, DeviceInfo::new("ios", "dev-1", "1.0.0"))
            .request_timeout(Duration::from_millis(500))
            .retry_delay(Duration::from_millis(10))
            .build();
        ApiClient::new(config, Arc::new(MemoryTokenStore::new())).unwrap()
    }

    #[test]
    fn attempt_counter_allows_exactly_one_retry() {
        let first = Attempt::first();
        assert_eq!(first.number(), 1);
        assert!(first.can_retry());

        let second = first.next();
        assert_eq!(second.number(), 2);
        assert!(!second.can_retry());
    }

    #[tokio::test]
    async fn connection_failure_maps_to_network_error() {
        // Nothing is listening on this port
        let client = test_client("http://127.0.0.1:9");
        let error = client.get::<Value>("/visitors").await.unwrap_err();

        assert_eq!(error.code, ErrorCode::NetworkError);
        assert_eq!(error.status, 0);
    }

    #[tokio::test]
    async fn deadline_overrun_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/visitors"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let error = client.get::<Value>("/visitors").await.unwrap_err();

        assert_eq!(error.code, ErrorCode::TimeoutError);
        assert_eq!(error.status, 408);
    }

    #[tokio::test]
    async fn device_headers_are_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notices"))
            .and(wiremock::matchers::header("X-Device-Platform", "ios"))
            .and(wiremock::matchers::header("X-Device-ID", "dev-1"))
            .and(wiremock::matchers::header("X-App-Version", "1.0.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let envelope = client.get::<Vec<Value>>("/notices").await.unwrap();
        assert!(envelope.success);
    }

    #[tokio::test]
    async fn unparseable_success_body_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notices"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let error = client.get::<Value>("/notices").await.unwrap_err();

        assert_eq!(error.code, ErrorCode::ApiError);
        assert_eq!(error.status, 200);
    }
}
