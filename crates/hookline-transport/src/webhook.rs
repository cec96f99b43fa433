//! Calls scoped to one interaction's follow-up token.

use hookline_core::{HttpResult, MessageData, Snowflake};
use serde_json::Value;

use crate::client::{HttpClient, RequestOptions};
use crate::route::{Method, Route};

/// Handle on an interaction's follow-up webhook.
///
/// Holds only the application id and the follow-up token, so it can be moved
/// into background work after the interaction itself is gone. The token
/// stays valid for 15 minutes after the interaction was created.
#[derive(Debug, Clone)]
pub struct Followup {
    client: HttpClient,
    application_id: Snowflake,
    token: String,
}

impl Followup {
    pub fn new(client: HttpClient, application_id: Snowflake, token: impl Into<String>) -> Self {
        Self {
            client,
            application_id,
            token: token.into(),
        }
    }

    pub fn application_id(&self) -> Snowflake {
        self.application_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn route(&self, method: Method, template: &str) -> Route {
        Route::new(method, template)
            .param("application_id", self.application_id)
            .param("token", &self.token)
            .webhook()
    }

    async fn call(&self, route: Route, body: Option<Value>) -> HttpResult<Value> {
        let response = self
            .client
            .send(&route, body, RequestOptions::new().unauthenticated())
            .await?;
        Ok(response.into_json())
    }

    /// Fetches the message created by the interaction's ack.
    pub async fn original_response(&self) -> HttpResult<Value> {
        let route = self.route(
            Method::Get,
            "/webhooks/{application_id}/{token}/messages/@original",
        );
        self.call(route, None).await
    }

    /// Edits the message created by the interaction's ack.
    ///
    /// This is also how a deferred "thinking" ack is turned into a reply.
    pub async fn edit_original_response(&self, message: &MessageData) -> HttpResult<Value> {
        let route = self.route(
            Method::Patch,
            "/webhooks/{application_id}/{token}/messages/@original",
        );
        self.call(route, Some(message.to_json())).await
    }

    pub async fn delete_original_response(&self) -> HttpResult<()> {
        let route = self.route(
            Method::Delete,
            "/webhooks/{application_id}/{token}/messages/@original",
        );
        self.call(route, None).await.map(|_| ())
    }

    /// Sends an additional message and returns it.
    pub async fn send(&self, message: &MessageData) -> HttpResult<Value> {
        let route = self.route(Method::Post, "/webhooks/{application_id}/{token}?wait=true");
        self.call(route, Some(message.to_json())).await
    }

    pub async fn edit_message(&self, message_id: Snowflake, message: &MessageData) -> HttpResult<Value> {
        let route = self
            .route(
                Method::Patch,
                "/webhooks/{application_id}/{token}/messages/{message_id}",
            )
            .param("message_id", message_id);
        self.call(route, Some(message.to_json())).await
    }

    pub async fn delete_message(&self, message_id: Snowflake) -> HttpResult<()> {
        let route = self
            .route(
                Method::Delete,
                "/webhooks/{application_id}/{token}/messages/{message_id}",
            )
            .param("message_id", message_id);
        self.call(route, None).await.map(|_| ())
    }
}
