//! Credential management
//!
//! Token types, persisted credential storage, and the single-flight refresh
//! protocol the HTTP client runs when a token is near expiry or a request
//! comes back 401.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │    ApiClient     │  attaches credentials, classifies failures
//! └────────┬─────────┘
//!          │
//!          ├──► RefreshCoordinator  (single-flight refresh)
//!          │         │
//!          │         └──► RefreshExecutor  (plain refresh call + cleanup)
//!          │
//!          └──► TokenStore          (persisted tokens + session)
//! ```

pub mod refresh;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use refresh::{RefreshCoordinator, RefreshExecutor};
pub use store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};
pub use types::{RefreshData, RefreshRequest, SessionContext, TokenSet};
