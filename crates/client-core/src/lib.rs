//! Resilient request core shared by FinchChat transport and session layers.
//!
//! This crate classifies homeserver responses as success or Matrix protocol
//! error, retries failed requests under a caller-supplied time budget while
//! honoring server backoff hints, and validates untyped JSON response
//! bodies against a small declarative schema algebra.

/// Stable error taxonomy for homeserver interactions.
pub mod error;
/// Response contract and success/error classification.
pub mod response;
/// Deadline-bounded retry driver with rate-limit compliance.
pub mod retry;
/// Declarative JSON schema algebra and validator.
pub mod schema;

pub use error::ApiError;
pub use response::{ApiResponse, BodyError, check_response};
pub use retry::{RetryBudget, retry};
pub use schema::{JsonKind, Schema, ensure_valid, is_valid};
