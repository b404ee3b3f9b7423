//! Authenticated HTTP transport for the SocietyHub API

pub mod client;
pub mod config;

// Re-export commonly used types
pub use client::{ApiClient, RequestOptions, UploadPart};
pub use config::{ApiClientConfig, ApiClientConfigBuilder, DeviceInfo};
