//! Shared fixtures for the framework's unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use hookline_core::{InboundRequest, Interaction};
use hookline_transport::{
    BackendError, BackendRequest, BackendResponse, ClientConfig, HttpBackend, HttpClient,
};
use parking_lot::Mutex;
use serde_json::Value;

use crate::context::InteractionContext;
use crate::waiter::WaiterRegistry;

/// Answers every request with the same response and records what it got.
pub struct StaticBackend {
    status: u16,
    body: Value,
    pub requests: Mutex<Vec<BackendRequest>>,
}

impl StaticBackend {
    pub fn json(status: u16, body: Value) -> Arc<Self> {
        Arc::new(Self {
            status,
            body,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl HttpBackend for StaticBackend {
    async fn execute(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        self.requests.lock().push(request);
        let mut response = BackendResponse {
            status: self.status,
            body: serde_json::to_vec(&self.body).unwrap().into(),
            ..Default::default()
        };
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        Ok(response)
    }
}

pub fn client(backend: Arc<StaticBackend>) -> HttpClient {
    HttpClient::with_backend(ClientConfig::new("token").application_id(99u64), backend)
}

pub fn context(interaction: Value) -> InteractionContext {
    context_with(interaction, StaticBackend::json(200, Value::Null))
}

pub fn context_with(interaction: Value, backend: Arc<StaticBackend>) -> InteractionContext {
    let interaction: Interaction = serde_json::from_value(interaction).unwrap();
    InteractionContext::new(interaction, client(backend), WaiterRegistry::new())
}

pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

pub fn public_key_hex() -> String {
    hex::encode(signing_key().verifying_key().to_bytes())
}

/// A correctly signed delivery of `body`.
pub fn signed(body: &Value) -> InboundRequest {
    let body = serde_json::to_vec(body).unwrap();
    let timestamp = "1700000000";
    let mut message = timestamp.as_bytes().to_vec();
    message.extend_from_slice(&body);
    let signature = hex::encode(signing_key().sign(&message).to_bytes());
    InboundRequest::new(Some(signature), Some(timestamp.to_string()), body)
}
