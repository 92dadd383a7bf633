use serde_json::Value;
use thiserror::Error;

/// Errors surfaced to callers when a homeserver response cannot be trusted.
///
/// Session and event-layer code branches on these three kinds. Retry policy
/// never raises them itself: the retry driver always hands back a response
/// for [`check_response`](crate::response::check_response) to interpret.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// The response was not recognizable as coming from a Matrix homeserver.
    #[error("server did not respond like a Matrix homeserver")]
    NotMatrixServer,
    /// A well-formed Matrix protocol error (`errcode` present in the body).
    #[error("Matrix API error (HTTP {code}): {body}")]
    Protocol {
        /// HTTP status code of the error response.
        code: u16,
        /// Decoded JSON error body as returned by the server.
        body: Value,
    },
    /// A response body failed schema validation.
    #[error("response body did not match the expected schema")]
    InvalidResponse,
}

impl ApiError {
    /// The `errcode` string of a protocol error, when present.
    pub fn errcode(&self) -> Option<&str> {
        match self {
            Self::Protocol { body, .. } => body.get("errcode").and_then(Value::as_str),
            _ => None,
        }
    }
}
