use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::ApiError;

/// Why a response body could not be decoded as JSON.
///
/// Kept separate from transport-level errors so retry policy can
/// distinguish "the connection died mid-body" from "the server sent
/// something that is not JSON".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BodyError {
    /// The body could not be read from the underlying connection.
    #[error("failed to read response body: {0}")]
    Read(String),
    /// The body was read but is not well-formed JSON.
    #[error("response body is not valid JSON: {0}")]
    Parse(String),
}

/// One HTTP response attempt from the homeserver.
///
/// Implementations read the wire stream at most once: the first
/// [`body_json`](Self::body_json) call decodes and caches its outcome, and
/// later calls return the cached result. [`release`](Self::release) frees
/// the underlying connection without discarding an already-cached body, so
/// it is safe to call before a backoff sleep.
#[async_trait]
pub trait ApiResponse {
    /// HTTP status code.
    fn status(&self) -> u16;

    /// Look up a response header by name. Lookup is case-insensitive.
    fn header(&self, name: &str) -> Option<&str>;

    /// Decode the body as JSON, reading the stream at most once.
    async fn body_json(&mut self) -> Result<Value, BodyError>;

    /// Release the underlying connection resources.
    fn release(&mut self);
}

/// Classify one HTTP response as success or error.
///
/// Returns the status code and decoded body for any status in `200..400`.
/// Otherwise the body is probed for the Matrix error convention: a decoded
/// object carrying `errcode` becomes [`ApiError::Protocol`]; an undecodable
/// body, or one without `errcode`, becomes [`ApiError::NotMatrixServer`].
/// Decode failures are never propagated raw.
pub async fn check_response<R>(resp: &mut R) -> Result<(u16, Value), ApiError>
where
    R: ApiResponse + Send,
{
    let status = resp.status();
    let body = resp
        .body_json()
        .await
        .map_err(|_| ApiError::NotMatrixServer)?;

    if (200..400).contains(&status) {
        return Ok((status, body));
    }

    if body.get("errcode").is_some() {
        Err(ApiError::Protocol { code: status, body })
    } else {
        Err(ApiError::NotMatrixServer)
    }
}
