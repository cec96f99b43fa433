//! The raw HTTP exchange beneath [`HttpClient`](crate::HttpClient).
//!
//! The client owns buckets, retries and status mapping; a backend only moves
//! one request over the wire. Tests script backends to drive the client
//! without a network.

use std::collections::HashMap;
#[cfg(feature = "http-client")]
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::route::Method;

/// One outbound request, fully resolved.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// One raw response.
#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    pub status: u16,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

/// Why a request produced no response.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The connection was reset, refused or aborted. Worth retrying.
    #[error("connection error: {0}")]
    Connection(String),

    /// Anything else (invalid URL, TLS failure, timeout, ...).
    #[error("{0}")]
    Other(String),
}

/// Performs raw HTTP exchanges.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn execute(&self, request: BackendRequest) -> Result<BackendResponse, BackendError>;
}

/// [`HttpBackend`] on top of a shared `reqwest` client.
#[cfg(feature = "http-client")]
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
}

#[cfg(feature = "http-client")]
impl ReqwestBackend {
    /// Creates a backend whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Other(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[cfg(feature = "http-client")]
#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(classify)?;

        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }
}

/// Separates retryable connection failures from everything else.
#[cfg(feature = "http-client")]
fn classify(error: reqwest::Error) -> BackendError {
    use std::error::Error as _;
    use std::io::ErrorKind;

    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && matches!(
                io.kind(),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused | ErrorKind::ConnectionAborted
            )
        {
            return BackendError::Connection(error.to_string());
        }
        source = cause.source();
    }

    if error.is_connect() {
        BackendError::Connection(error.to_string())
    } else {
        BackendError::Other(error.to_string())
    }
}
