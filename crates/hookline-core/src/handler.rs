//! The inbound seam between the HTTP endpoint and the dispatcher.
//!
//! The transport layer owns the socket and the HTTP framing; it hands each
//! delivery to an [`InteractionHandler`] as an [`InboundRequest`] and writes
//! back whatever [`InboundResponse`] it receives.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

/// Header carrying the hex-encoded Ed25519 signature.
pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";

/// Header carrying the timestamp that prefixes the signed message.
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// One inbound webhook delivery, before any validation.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// Value of the signature header, if present.
    pub signature: Option<String>,
    /// Value of the timestamp header, if present.
    pub timestamp: Option<String>,
    /// Raw request body exactly as received.
    pub body: Bytes,
}

impl InboundRequest {
    /// Creates a request from its parts.
    pub fn new(signature: Option<String>, timestamp: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            signature,
            timestamp,
            body: body.into(),
        }
    }
}

/// Body of an [`InboundResponse`].
#[derive(Debug, Clone, PartialEq)]
pub enum InboundBody {
    /// A JSON document (acks and liveness payloads).
    Json(Value),
    /// A terse plain-text error.
    Text(String),
}

/// What the endpoint writes back for one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: InboundBody,
}

impl InboundResponse {
    /// A `200 OK` JSON response.
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: InboundBody::Json(body),
        }
    }

    /// A JSON response with a custom status.
    pub fn json_with_status(status: u16, body: Value) -> Self {
        Self {
            status,
            body: InboundBody::Json(body),
        }
    }

    /// A plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: InboundBody::Text(body.into()),
        }
    }

    /// Returns the JSON body, if this is a JSON response.
    pub fn as_json(&self) -> Option<&Value> {
        match &self.body {
            InboundBody::Json(v) => Some(v),
            InboundBody::Text(_) => None,
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Receives validated-or-not deliveries from the endpoint.
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    /// Handles one `POST` delivery and produces the synchronous reply.
    async fn handle(&self, request: InboundRequest) -> InboundResponse;

    /// Produces the reply to a `GET` on the endpoint.
    fn liveness(&self) -> InboundResponse;
}

/// Shared, type-erased handler.
pub type BoxedInteractionHandler = Arc<dyn InteractionHandler>;
