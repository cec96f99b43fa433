//! The inbound interaction endpoint.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use hookline_core::{
    BoxedInteractionHandler, InboundBody, InboundRequest, InboundResponse, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
use tokio::net::TcpListener;
use tracing::{error, info, trace};

/// Serves `GET` and `POST` on one path and forwards both to a handler.
pub struct InteractionServer {
    addr: String,
    path: String,
    handler: BoxedInteractionHandler,
}

/// Shared state for the HTTP server.
struct ServerState {
    handler: BoxedInteractionHandler,
}

impl InteractionServer {
    /// Creates a server on `127.0.0.1:8080` at `/`.
    pub fn new(handler: BoxedInteractionHandler) -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            path: "/".to_string(),
            handler,
        }
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    /// Builds the axum router without binding a socket.
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            handler: Arc::clone(&self.handler),
        });
        Router::new()
            .route(&self.path, get(liveness).post(interaction))
            .with_state(state)
    }

    /// Binds the listening socket.
    pub async fn bind(self) -> std::io::Result<BoundServer> {
        let listener = TcpListener::bind(&self.addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(BoundServer {
            router: self.router(),
            listener,
            local_addr,
            path: self.path,
        })
    }
}

/// An endpoint with its socket bound, ready to serve.
pub struct BoundServer {
    router: Router,
    listener: TcpListener,
    local_addr: SocketAddr,
    path: String,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until `shutdown` completes, then finishes in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %self.local_addr, path = %self.path, "Interaction endpoint listening");
        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;
        match &result {
            Ok(()) => info!("Interaction endpoint stopped"),
            Err(e) => error!(error = %e, "Interaction endpoint failed"),
        }
        result
    }
}

async fn liveness(State(state): State<Arc<ServerState>>) -> Response {
    into_axum(state.handler.liveness())
}

async fn interaction(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    trace!(len = body.len(), "Received interaction POST");

    let request = InboundRequest::new(header(SIGNATURE_HEADER), header(TIMESTAMP_HEADER), body);
    into_axum(state.handler.handle(request).await)
}

fn into_axum(response: InboundResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match response.body {
        InboundBody::Json(value) => (status, Json(value)).into_response(),
        InboundBody::Text(text) => (status, text).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use hookline_core::InteractionHandler;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    /// Echoes the headers it was given.
    struct EchoHandler;

    #[async_trait]
    impl InteractionHandler for EchoHandler {
        async fn handle(&self, request: InboundRequest) -> InboundResponse {
            if request.signature.is_none() {
                return InboundResponse::text(401, "invalid request signature");
            }
            InboundResponse::json(json!({
                "signature": request.signature,
                "timestamp": request.timestamp,
                "body": String::from_utf8_lossy(&request.body),
            }))
        }

        fn liveness(&self) -> InboundResponse {
            InboundResponse::json_with_status(503, json!({"error": "bot is not ready yet"}))
        }
    }

    fn server() -> Router {
        InteractionServer::new(Arc::new(EchoHandler))
            .path("interactions")
            .router()
    }

    #[tokio::test]
    async fn test_post_forwards_headers_and_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/interactions")
            .header("X-Signature-Ed25519", "abcd")
            .header("X-Signature-Timestamp", "123")
            .body(Body::from(r#"{"type":1}"#))
            .unwrap();

        let response = server().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["signature"], "abcd");
        assert_eq!(body["timestamp"], "123");
        assert_eq!(body["body"], r#"{"type":1}"#);
    }

    #[tokio::test]
    async fn test_text_errors_keep_status() {
        let request = Request::builder()
            .method("POST")
            .uri("/interactions")
            .body(Body::from("{}"))
            .unwrap();

        let response = server().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"invalid request signature");
    }

    #[tokio::test]
    async fn test_get_returns_liveness() {
        let request = Request::builder()
            .uri("/interactions")
            .body(Body::empty())
            .unwrap();

        let response = server().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
