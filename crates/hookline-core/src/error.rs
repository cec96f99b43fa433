//! Unified error types for the Hookline core.
//!
//! Outbound failures (calls made against the remote API) are described by
//! [`HttpError`]; inbound failures (webhook deliveries that cannot be
//! routed) are described by [`InteractionError`]. Handler-level errors live
//! in `hookline-framework`.

use std::fmt;

use thiserror::Error;

use crate::handler::InboundResponse;

// =============================================================================
// Outbound (HTTP API) Errors
// =============================================================================

/// The interesting parts of a failed API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// HTTP status code.
    pub status: u16,
    /// API-specific error code (`0` when absent).
    pub code: i64,
    /// Human readable message, with field errors appended when present.
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(status: u16, code: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} (code: {})", self.status, self.code)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Errors returned by the rate-limited HTTP transport.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// 400 without a more specific mapping.
    #[error("bad request: {0}")]
    BadRequest(ErrorResponse),

    /// 400 whose error code marks an automod block.
    #[error("blocked by automod: {0}")]
    AutomodBlock(ErrorResponse),

    /// 403.
    #[error("forbidden: {0}")]
    Forbidden(ErrorResponse),

    /// 404.
    #[error("not found: {0}")]
    NotFound(ErrorResponse),

    /// 429 whose body carried no retry information (e.g. an edge block).
    #[error("rate limited without retry information: {0}")]
    Ratelimited(ErrorResponse),

    /// 5xx that persisted through every attempt.
    #[error("server error after {attempts} attempts: {response}")]
    ServerError {
        /// The last response received.
        response: ErrorResponse,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Any other non-success status.
    #[error("API error: {0}")]
    Api(ErrorResponse),

    /// The connection was reset or refused on every attempt.
    #[error("connection failed after {attempts} attempts: {reason}")]
    Connection {
        /// Description of the last failure.
        reason: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),
}

impl HttpError {
    /// Returns the API response carried by this error, if any.
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self {
            Self::BadRequest(r)
            | Self::AutomodBlock(r)
            | Self::Forbidden(r)
            | Self::NotFound(r)
            | Self::Ratelimited(r)
            | Self::Api(r) => Some(r),
            Self::ServerError { response, .. } => Some(response),
            Self::Connection { .. } | Self::Request(_) => None,
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }
}

// =============================================================================
// Inbound (Interaction) Errors
// =============================================================================

/// Errors that stop an inbound delivery before a handler produces an ack.
#[derive(Debug, Clone, Error)]
pub enum InteractionError {
    /// No public key is configured, so nothing can be authenticated.
    #[error("invalid public key")]
    MissingPublicKey,

    /// The signature did not verify.
    #[error("invalid request signature")]
    InvalidSignature,

    /// The body or the signature headers could not be decoded.
    #[error("invalid request body")]
    InvalidBody(String),

    /// The `type` field named no known interaction kind.
    #[error("invalid request body")]
    UnknownType(u8),

    /// The payload was well-formed but could not be routed.
    #[error("{0}")]
    BadRequest(String),

    /// No registered command, component or callback matched.
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl InteractionError {
    /// HTTP status sent back to the caller.
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingPublicKey | Self::InvalidSignature => 401,
            Self::InvalidBody(_) | Self::UnknownType(_) | Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
        }
    }

    /// Converts into the terse text response returned to the caller.
    pub fn into_response(self) -> InboundResponse {
        InboundResponse::text(self.status(), self.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for outbound HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Result type for inbound routing.
pub type InteractionResult<T> = Result<T, InteractionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_display() {
        let r = ErrorResponse::new(403, 50013, "Missing Permissions");
        assert_eq!(r.to_string(), "HTTP 403 (code: 50013): Missing Permissions");
        assert_eq!(ErrorResponse::new(500, 0, "").to_string(), "HTTP 500 (code: 0)");
    }

    #[test]
    fn test_interaction_error_status() {
        assert_eq!(InteractionError::InvalidSignature.status(), 401);
        assert_eq!(InteractionError::UnknownType(42).status(), 400);
        assert_eq!(InteractionError::NotFound("command").to_string(), "command not found");
    }
}
