//! # SocietyHub Domain
//!
//! Shared domain types for the SocietyHub API client.
//!
//! This crate contains:
//! - The client-facing error type and error taxonomy
//! - The response envelope returned by the SocietyHub REST API
//!
//! ## Architecture
//! - No dependencies on other SocietyHub crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod envelope;
pub mod errors;

// Re-export commonly used items
pub use envelope::{extract_error_message, ApiResponse};
pub use errors::{ClientError, ErrorCode, Result};
