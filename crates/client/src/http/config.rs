//! Client configuration
//!
//! Timeouts, retry policy, refresh thresholds, and the static device identity
//! attached to every request.

use std::time::Duration;

/// Static device identity sent with every request.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Operating platform (`ios`, `android`, ...) — `X-Device-Platform`
    pub platform: String,

    /// Stable per-install identifier — `X-Device-ID`
    pub device_id: String,

    /// Application version string — `X-App-Version`
    pub app_version: String,
}

impl DeviceInfo {
    /// Create a device identity.
    #[must_use]
    pub fn new(
        platform: impl Into<String>,
        device_id: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            device_id: device_id.into(),
            app_version: app_version.into(),
        }
    }
}

/// Configuration for [`ApiClient`](crate::http::ApiClient).
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL of the API, without a trailing slash
    pub base_url: String,

    /// Per-request timeout for regular calls
    pub request_timeout: Duration,

    /// Per-request timeout for uploads
    pub upload_timeout: Duration,

    /// Delay before the single automatic 5xx retry
    pub retry_delay: Duration,

    /// Refresh the access token when it expires within this many seconds
    pub refresh_threshold_seconds: i64,

    /// How long a request waits for a proactive refresh before falling back
    /// to the possibly-stale token
    pub proactive_refresh_wait: Duration,

    /// Device identity headers
    pub device: DeviceInfo,
}

impl ApiClientConfig {
    /// Start building a configuration for the given base URL and device.
    #[must_use]
    pub fn builder(base_url: impl Into<String>, device: DeviceInfo) -> ApiClientConfigBuilder {
        ApiClientConfigBuilder::new(base_url, device)
    }

    /// Absolute URL of the refresh endpoint.
    #[must_use]
    pub fn refresh_url(&self) -> String {
        format!("{}/auth/refresh", self.base_url)
    }
}

/// Builder for [`ApiClientConfig`].
#[derive(Debug)]
pub struct ApiClientConfigBuilder {
    base_url: String,
    request_timeout: Duration,
    upload_timeout: Duration,
    retry_delay: Duration,
    refresh_threshold_seconds: i64,
    proactive_refresh_wait: Duration,
    device: DeviceInfo,
}

impl ApiClientConfigBuilder {
    fn new(base_url: impl Into<String>, device: DeviceInfo) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(120),
            retry_delay: Duration::from_secs(1),
            refresh_threshold_seconds: 300,
            proactive_refresh_wait: Duration::from_secs(3),
            device,
        }
    }

    /// Timeout applied to every non-upload request.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Timeout applied to uploads.
    #[must_use]
    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Delay before the single automatic retry of a 5xx response.
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Refresh tokens this many seconds before expiry (default: 300).
    #[must_use]
    pub fn refresh_threshold_seconds(mut self, seconds: i64) -> Self {
        self.refresh_threshold_seconds = seconds;
        self
    }

    /// Bound on the proactive-refresh wait before a request proceeds with a
    /// possibly-stale token (default: 3 seconds).
    #[must_use]
    pub fn proactive_refresh_wait(mut self, wait: Duration) -> Self {
        self.proactive_refresh_wait = wait;
        self
    }

    /// Finalize the configuration. Trailing slashes on the base URL are
    /// stripped so path joining stays predictable.
    #[must_use]
    pub fn build(self) -> ApiClientConfig {
        ApiClientConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            request_timeout: self.request_timeout,
            upload_timeout: self.upload_timeout,
            retry_delay: self.retry_delay,
            refresh_threshold_seconds: self.refresh_threshold_seconds,
            proactive_refresh_wait: self.proactive_refresh_wait,
            device: self.device,
        }
    }
}
