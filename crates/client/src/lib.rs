//! # SocietyHub Client
//!
//! HTTP client for the SocietyHub residential-society management API.
//!
//! The client owns the authentication/retry pipeline: it attaches device and
//! session headers to every request, refreshes access tokens transparently
//! (single-flight, so concurrent requests never race to refresh), retries a
//! failed request at most once, and maps every terminal failure onto one
//! uniform error taxonomy.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use societyhub_client::auth::FileTokenStore;
//! use societyhub_client::http::{ApiClient, ApiClientConfig, DeviceInfo};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = DeviceInfo::new("android", "device-123", "2.1.0");
//!     let config = ApiClientConfig::builder("https://api.societyhub.example", device).build();
//!     let store = Arc::new(FileTokenStore::new("/data/societyhub/credentials.json"));
//!
//!     // Construct once at startup and share; the single-flight refresh
//!     // guarantee is scoped to this instance and its clones.
//!     let client = ApiClient::new(config, store)?;
//!
//!     let visitors: societyhub_domain::ApiResponse<serde_json::Value> =
//!         client.get("/visitors").await?;
//!     println!("{}", visitors.data);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod http;

// Re-export the client-facing error types alongside the client itself
pub use societyhub_domain::{ApiResponse, ClientError, ErrorCode};
