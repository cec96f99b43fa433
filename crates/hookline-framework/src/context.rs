//! The per-interaction context handed to handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hookline_core::{CommandType, Interaction, Snowflake};
use hookline_transport::{Followup, HttpClient};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

use crate::error::{HandlerError, HandlerResult};
use crate::handler::ComponentHandler;
use crate::waiter::WaiterRegistry;

/// Delay before fetching the original response of a fresh ack, giving the
/// remote API time to store the message.
const ORIGINAL_RESPONSE_DELAY: Duration = Duration::from_millis(150);

struct ContextInner {
    interaction: Interaction,
    client: HttpClient,
    waiters: WaiterRegistry,
    /// Id of the original response, once fetched.
    original_message: Mutex<Option<Snowflake>>,
}

/// Everything a handler can see about one interaction.
///
/// Cheap to clone; clones share the interaction and the cached original
/// response id.
#[derive(Clone)]
pub struct InteractionContext {
    inner: Arc<ContextInner>,
}

impl InteractionContext {
    pub fn new(interaction: Interaction, client: HttpClient, waiters: WaiterRegistry) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                interaction,
                client,
                waiters,
                original_message: Mutex::new(None),
            }),
        }
    }

    pub fn interaction(&self) -> &Interaction {
        &self.inner.interaction
    }

    pub fn client(&self) -> &HttpClient {
        &self.inner.client
    }

    pub fn waiters(&self) -> &WaiterRegistry {
        &self.inner.waiters
    }

    /// The follow-up webhook of this interaction.
    ///
    /// The handle owns only the token and ids, so it can outlive the context.
    /// Fails with [`HandlerError::MissingApplicationId`] when neither the
    /// interaction nor the client knows the application.
    pub fn followup(&self) -> HandlerResult<Followup> {
        let application_id = self
            .inner
            .interaction
            .application_id
            .or_else(|| self.inner.client.application_id())
            .ok_or(HandlerError::MissingApplicationId)?;
        Ok(Followup::new(
            self.inner.client.clone(),
            application_id,
            self.inner.interaction.token.clone(),
        ))
    }

    pub fn author(&self) -> Option<&Value> {
        self.inner.interaction.author()
    }

    pub fn author_id(&self) -> Option<Snowflake> {
        self.inner.interaction.author_id()
    }

    pub fn guild_id(&self) -> Option<Snowflake> {
        self.inner.interaction.guild_id
    }

    pub fn channel_id(&self) -> Option<Snowflake> {
        self.inner.interaction.channel_id
    }

    /// Id of the message this interaction refers to, falling back to the
    /// cached original response.
    pub fn message_id(&self) -> Option<Snowflake> {
        self.inner
            .interaction
            .message_id()
            .or(*self.inner.original_message.lock())
    }

    pub fn custom_id(&self) -> Option<&str> {
        self.inner.interaction.custom_id()
    }

    pub fn command_name(&self) -> Option<&str> {
        self.inner.interaction.command_name()
    }

    /// Values picked in a select menu.
    pub fn select_values(&self) -> &[String] {
        &self.inner.interaction.data.values
    }

    /// Submitted text inputs of a modal, keyed by `custom_id`.
    pub fn modal_values(&self) -> HashMap<String, String> {
        self.inner.interaction.modal_values()
    }

    /// The target of a context-menu command: the merged member/user for user
    /// commands, the message for message commands.
    pub fn target(&self) -> Option<Value> {
        let data = &self.inner.interaction.data;
        let id = data.target_id?.to_string();
        match data.command_type {
            CommandType::User => data.resolved.user_or_member(&id),
            CommandType::Message => data.resolved.messages.get(&id).cloned(),
            _ => None,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.interaction.created_at()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.inner.interaction.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.inner.interaction.is_expired()
    }

    /// Fetches the message created by this interaction's ack and caches its
    /// id.
    pub async fn original_response(&self) -> HandlerResult<Value> {
        let message = self.followup()?.original_response().await?;
        if let Some(id) = message
            .get("id")
            .and_then(|id| serde_json::from_value::<Snowflake>(id.clone()).ok())
        {
            *self.inner.original_message.lock() = Some(id);
        }
        Ok(message)
    }

    /// Waits for the next interaction on this interaction's message.
    ///
    /// For components the message is the one the component sits on; for
    /// commands it is the original response, fetched shortly after the ack
    /// if it is not cached yet. `follow_up` produces the ack of the awaited
    /// interaction. Returns `None` on timeout, when the wait is replaced, or
    /// when the message cannot be determined.
    pub async fn wait_for_interaction<H>(
        &self,
        allowed: Vec<Snowflake>,
        timeout: Duration,
        follow_up: H,
    ) -> Option<InteractionContext>
    where
        H: ComponentHandler,
    {
        let message_id = match self.message_id() {
            Some(id) => id,
            None => {
                tokio::time::sleep(ORIGINAL_RESPONSE_DELAY).await;
                if let Err(e) = self.original_response().await {
                    warn!(error = %e, "Failed to fetch original response for waiter");
                    return None;
                }
                self.message_id()?
            }
        };
        self.inner
            .waiters
            .wait(message_id, allowed, timeout, follow_up)
            .await
    }
}

impl std::fmt::Debug for InteractionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionContext")
            .field("id", &self.inner.interaction.id)
            .field("kind", &self.inner.interaction.kind)
            .finish()
    }
}
