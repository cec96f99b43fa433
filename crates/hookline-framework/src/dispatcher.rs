//! The interaction dispatcher.
//!
//! [`Dispatcher`] receives every inbound delivery, authenticates it, decodes
//! the envelope and routes it:
//!
//! 1. pings are answered with a pong
//! 2. commands are looked up by name and descended through their groups
//! 3. components and modals go to a pending waiter on their message first,
//!    then to the exact `custom_id` route, then to the regex routes in
//!    registration order
//! 4. autocomplete goes to the focused option's callback
//!
//! Handler failures (errors and panics) are reported to the
//! `interaction_error` listeners, or logged when there are none, and the
//! error responder decides whether the user sees a message or the request
//! fails with `500`.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::builder(client)
//!     .verifier(Verifier::from_hex(&public_key)?)
//!     .command(Command::new("ping", "Pong!").handler(ping))
//!     .component("confirm", confirm)
//!     .build();
//!
//! InteractionServer::new(Arc::new(dispatcher.clone())).bind().await?.serve(shutdown).await?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use hookline_core::{
    InboundRequest, InboundResponse, Interaction, InteractionError, InteractionHandler,
    InteractionResponse, InteractionResult, InteractionType, Snowflake,
};
use hookline_transport::{HttpClient, Verifier};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::Service;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::arguments::Arguments;
use crate::command::{Command, OptionSpec, commands_json};
use crate::component::ComponentRegistry;
use crate::context::InteractionContext;
use crate::error::{HandlerError, HandlerResult};
use crate::handler::{Ack, ComponentHandler};
use crate::listener::{
    ErrorEvent, ErrorResponder, Listener, Listeners, PingEvent, RawEvent, default_error_responder,
};
use crate::waiter::WaiterRegistry;

struct DispatcherInner {
    verifier: Verifier,
    client: HttpClient,
    commands: HashMap<String, Command>,
    components: ComponentRegistry,
    waiters: WaiterRegistry,
    listeners: Listeners,
    error_responder: ErrorResponder,
    debug_events: bool,
    tracker: TaskTracker,
    cancel: CancellationToken,
    /// The bot user, once known.
    ready: RwLock<Option<Value>>,
    started_at: DateTime<Utc>,
}

/// Routes inbound interactions to registered handlers.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

// ============================================================================
// Builder
// ============================================================================

/// Collects commands, routes and listeners for a [`Dispatcher`].
pub struct DispatcherBuilder {
    verifier: Verifier,
    client: HttpClient,
    commands: HashMap<String, Command>,
    components: ComponentRegistry,
    listeners: Listeners,
    error_responder: ErrorResponder,
    debug_events: bool,
}

impl DispatcherBuilder {
    /// The signature verifier. Without one every delivery is rejected.
    pub fn verifier(mut self, verifier: Verifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Registers a top-level command, replacing one with the same name.
    pub fn command(mut self, command: Command) -> Self {
        if self
            .commands
            .insert(command.name().to_string(), command)
            .is_some()
        {
            warn!("Command registered twice; keeping the last one");
        }
        self
    }

    pub fn component(mut self, custom_id: impl Into<String>, handler: impl ComponentHandler) -> Self {
        self.components.add(custom_id, handler);
        self
    }

    /// Routes every `custom_id` matching `pattern` from its first character.
    pub fn component_regex(
        mut self,
        pattern: &str,
        handler: impl ComponentHandler,
    ) -> Result<Self, regex::Error> {
        self.components.add_regex(pattern, handler)?;
        Ok(self)
    }

    pub fn on_ping(mut self, listener: impl Listener<PingEvent>) -> Self {
        self.listeners.on_ping(listener);
        self
    }

    pub fn on_interaction_error(mut self, listener: impl Listener<ErrorEvent>) -> Self {
        self.listeners.on_interaction_error(listener);
        self
    }

    /// Receives every raw payload; only fires with
    /// [`debug_events`](Self::debug_events) enabled.
    pub fn on_raw_interaction(mut self, listener: impl Listener<RawEvent>) -> Self {
        self.listeners.on_raw_interaction(listener);
        self
    }

    /// Replaces the default error responder.
    pub fn error_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&InteractionContext, &HandlerError) -> Option<Ack> + Send + Sync + 'static,
    {
        self.error_responder = Arc::new(responder);
        self
    }

    pub fn debug_events(mut self, enabled: bool) -> Self {
        self.debug_events = enabled;
        self
    }

    pub fn build(self) -> Dispatcher {
        info!(
            commands = self.commands.len(),
            components = self.components.len(),
            "Dispatcher built"
        );
        Dispatcher {
            inner: Arc::new(DispatcherInner {
                verifier: self.verifier,
                client: self.client,
                commands: self.commands,
                components: self.components,
                waiters: WaiterRegistry::new(),
                listeners: self.listeners,
                error_responder: self.error_responder,
                debug_events: self.debug_events,
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
                ready: RwLock::new(None),
                started_at: Utc::now(),
            }),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

impl Dispatcher {
    pub fn builder(client: HttpClient) -> DispatcherBuilder {
        DispatcherBuilder {
            verifier: Verifier::disabled(),
            client,
            commands: HashMap::new(),
            components: ComponentRegistry::new(),
            listeners: Listeners::default(),
            error_responder: Arc::new(default_error_responder),
            debug_events: false,
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.inner.client
    }

    pub fn waiters(&self) -> &WaiterRegistry {
        &self.inner.waiters
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.inner.commands.get(name)
    }

    /// Registration payloads of all top-level commands, sorted by name.
    pub fn commands_json(&self) -> Value {
        let mut commands: Vec<&Command> = self.inner.commands.values().collect();
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands_json(commands)
    }

    /// Records the bot user; liveness checks succeed from now on.
    pub fn mark_ready(&self, user: Value) {
        let username = user
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or("?");
        info!(username, "Dispatcher ready");
        *self.inner.ready.write() = Some(user);
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.read().is_some()
    }

    /// Cancelled when the dispatcher shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Number of background tasks still running.
    pub fn pending_tasks(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Handles one delivery and produces the synchronous reply.
    pub async fn handle(&self, request: InboundRequest) -> InboundResponse {
        match self.route(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(status = e.status(), error = %e, "Rejected interaction");
                e.into_response()
            }
        }
    }

    async fn route(&self, request: InboundRequest) -> InteractionResult<InboundResponse> {
        self.inner.verifier.verify(
            request.signature.as_deref(),
            request.timestamp.as_deref(),
            &request.body,
        )?;

        if self.inner.debug_events && self.inner.listeners.has_raw_interaction() {
            let payload: Value = serde_json::from_slice(&request.body)
                .map_err(|e| InteractionError::InvalidBody(e.to_string()))?;
            let payload = Arc::new(payload);
            for listener in &self.inner.listeners.raw_interaction {
                self.inner.tracker.spawn(listener.call(RawEvent {
                    payload: Arc::clone(&payload),
                }));
            }
        }

        let interaction = Interaction::from_json(&request.body)
            .map_err(|e| InteractionError::InvalidBody(e.to_string()))?;
        let span = info_span!(
            "interaction",
            id = %interaction.id,
            kind = interaction.kind.as_str(),
        );

        async move {
            match interaction.kind {
                InteractionType::Ping => Ok(self.ping(interaction)),
                InteractionType::ApplicationCommand => self.application_command(self.context(interaction)).await,
                InteractionType::MessageComponent | InteractionType::ModalSubmit => {
                    self.component(self.context(interaction)).await
                }
                InteractionType::Autocomplete => self.autocomplete(self.context(interaction)).await,
                InteractionType::Unknown(kind) => Err(InteractionError::UnknownType(kind)),
            }
        }
        .instrument(span)
        .await
    }

    fn context(&self, interaction: Interaction) -> InteractionContext {
        InteractionContext::new(
            interaction,
            self.inner.client.clone(),
            self.inner.waiters.clone(),
        )
    }

    fn ping(&self, interaction: Interaction) -> InboundResponse {
        if self.inner.listeners.has_ping() {
            let interaction = Arc::new(interaction);
            for listener in &self.inner.listeners.ping {
                self.inner.tracker.spawn(listener.call(PingEvent {
                    interaction: Arc::clone(&interaction),
                }));
            }
        } else {
            info!("Received ping, acknowledging");
        }
        InboundResponse::json(InteractionResponse::pong().to_json())
    }

    async fn application_command(&self, ctx: InteractionContext) -> InteractionResult<InboundResponse> {
        let interaction = ctx.interaction();
        let name = interaction.command_name().unwrap_or_default();
        let Some(command) = self.inner.commands.get(name) else {
            warn!(command = name, "Unknown command");
            return Err(InteractionError::NotFound("command"));
        };

        let (leaf, options) = command.resolve(&interaction.data.options)?;
        let args = Arguments::from_options(options, &interaction.data.resolved)?;
        debug!(command = name, leaf = leaf.name(), args = args.len(), "Invoking command");

        Ok(self.run(ctx.clone(), leaf.invoke(ctx.clone(), args)).await)
    }

    async fn component(&self, ctx: InteractionContext) -> InteractionResult<InboundResponse> {
        let custom_id = ctx
            .custom_id()
            .ok_or_else(|| InteractionError::InvalidBody("missing custom_id".to_string()))?
            .to_string();

        if ctx.interaction().message_id().is_some() {
            let delivered = AssertUnwindSafe(self.inner.waiters.deliver(ctx.clone()))
                .catch_unwind()
                .await;
            match delivered {
                Ok(None) => {}
                Ok(Some(result)) => return Ok(self.finish(ctx, result)),
                Err(panic) => return Ok(self.finish(ctx, Err(panic_error(panic)))),
            }
        }

        let Some(handler) = self.inner.components.find(&custom_id) else {
            debug!(custom_id = %custom_id, "No route for component");
            return Err(InteractionError::NotFound("interaction"));
        };
        debug!(custom_id = %custom_id, "Invoking component handler");
        Ok(self.run(ctx.clone(), handler.call(ctx)).await)
    }

    async fn autocomplete(&self, ctx: InteractionContext) -> InteractionResult<InboundResponse> {
        let interaction = ctx.interaction();
        let name = interaction.command_name().unwrap_or_default();
        let command = self
            .inner
            .commands
            .get(name)
            .ok_or(InteractionError::NotFound("command"))?;
        let (leaf, options) = command.resolve(&interaction.data.options)?;

        let focused = options
            .iter()
            .find(|o| o.focused)
            .ok_or_else(|| InteractionError::BadRequest("focused option not found".to_string()))?;
        let handler = leaf
            .option_spec(&focused.name)
            .and_then(OptionSpec::autocomplete_handler)
            .ok_or(InteractionError::NotFound("autocomplete"))?;
        let current = match &focused.value {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let suggestions = handler.call(ctx.clone(), current);
        let task = async move {
            suggestions
                .await
                .map(|choices| Ack::new(InteractionResponse::autocomplete(choices)))
        };
        Ok(self.run(ctx, task).await)
    }

    /// Runs a handler future, catching panics.
    async fn run<F>(&self, ctx: InteractionContext, handler: F) -> InboundResponse
    where
        F: Future<Output = HandlerResult<Ack>>,
    {
        let result = AssertUnwindSafe(handler)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panic_error(panic)));
        self.finish(ctx, result)
    }

    fn finish(&self, ctx: InteractionContext, result: HandlerResult<Ack>) -> InboundResponse {
        match result {
            Ok(ack) => self.acknowledge(ctx, ack),
            Err(e) => {
                let error = Arc::new(e);
                self.report(&ctx, &error);
                match (self.inner.error_responder)(&ctx, &*error) {
                    Some(ack) => self.acknowledge(ctx, ack),
                    None => InboundResponse::text(500, "internal server error"),
                }
            }
        }
    }

    fn acknowledge(&self, ctx: InteractionContext, ack: Ack) -> InboundResponse {
        let (response, then) = ack.into_parts();
        if let Some(task) = then {
            self.spawn_task(ctx, task);
        }
        InboundResponse::json(response.to_json())
    }

    fn report(&self, ctx: &InteractionContext, error: &Arc<HandlerError>) {
        if !self.inner.listeners.has_interaction_error() {
            error!(
                interaction = %ctx.interaction().id,
                kind = ctx.interaction().kind.as_str(),
                error = %error,
                "Interaction handler failed"
            );
            return;
        }
        for listener in &self.inner.listeners.interaction_error {
            self.inner.tracker.spawn(listener.call(ErrorEvent {
                ctx: ctx.clone(),
                error: Arc::clone(error),
            }));
        }
    }

    /// Runs the continuation of an ack until it finishes or the dispatcher
    /// shuts down.
    fn spawn_task(&self, ctx: InteractionContext, task: BoxFuture<'static, HandlerResult<()>>) {
        let dispatcher = self.clone();
        let cancel = self.inner.cancel.clone();
        let span = info_span!("background", interaction = %ctx.interaction().id);
        self.inner.tracker.spawn(
            async move {
                let result = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Background task cancelled by shutdown");
                        return;
                    }
                    result = AssertUnwindSafe(task).catch_unwind() => result,
                };
                if let Err(e) = result.unwrap_or_else(|panic| Err(panic_error(panic))) {
                    dispatcher.report(&ctx, &Arc::new(e));
                }
            }
            .instrument(span),
        );
    }

    /// The reply to a `GET` on the endpoint.
    pub fn liveness(&self) -> InboundResponse {
        let Some(user) = self.inner.ready.read().clone() else {
            return InboundResponse::json_with_status(503, json!({"error": "bot is not ready yet"}));
        };

        let created_at = user
            .get("id")
            .and_then(|id| serde_json::from_value::<Snowflake>(id.clone()).ok())
            .map(|id| id.created_at().to_rfc3339());
        let started_at = self.inner.started_at;

        InboundResponse::json(json!({
            "@me": {
                "id": user.get("id"),
                "username": user.get("username"),
                "discriminator": user.get("discriminator"),
                "created_at": created_at,
            },
            "last_reboot": {
                "datetime": started_at.to_rfc3339(),
                "timedelta": format_uptime(Utc::now() - started_at),
                "unix": started_at.timestamp(),
            },
        }))
    }

    /// Stops background work: cancels pending tasks and waits up to
    /// `timeout` for them to finish. Returns whether they all did.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        let pending = self.inner.tracker.len();
        if pending > 0 {
            info!(pending, "Waiting for background tasks");
        }
        let drained = tokio::time::timeout(timeout, self.inner.tracker.wait())
            .await
            .is_ok();
        if !drained {
            warn!(pending = self.inner.tracker.len(), "Background tasks did not finish in time");
        }
        drained
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> HandlerError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    HandlerError::Panic(message)
}

fn format_uptime(elapsed: chrono::TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

#[async_trait]
impl InteractionHandler for Dispatcher {
    async fn handle(&self, request: InboundRequest) -> InboundResponse {
        Dispatcher::handle(self, request).await
    }

    fn liveness(&self) -> InboundResponse {
        Dispatcher::liveness(self)
    }
}

impl Service<InboundRequest> for Dispatcher {
    type Response = InboundResponse;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<InboundResponse, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: InboundRequest) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.handle(request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, StaticBackend};
    use hookline_core::{Choice, InboundBody};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    async fn echo(_ctx: InteractionContext, args: Arguments) -> Ack {
        Ack::message(args.to_json().to_string())
    }

    async fn explode(_ctx: InteractionContext, _args: Arguments) -> Ack {
        panic!("boom")
    }

    async fn colours(_ctx: InteractionContext, current: String) -> HandlerResult<Vec<Choice>> {
        Ok((0..40).map(|i| Choice::from(format!("{current}{i}"))).collect())
    }

    fn builder() -> DispatcherBuilder {
        let verifier = Verifier::from_hex(&testing::public_key_hex()).unwrap();
        Dispatcher::builder(testing::client(StaticBackend::json(200, json!({}))))
            .verifier(verifier)
            .command(
                Command::new("cfg", "Config")
                    .subcommand(
                        Command::new("sub", "Sub")
                            .option(OptionSpec::string("x", "X"))
                            .handler(echo),
                    )
                    .subcommand(
                        Command::new("paint", "Paint")
                            .option(OptionSpec::string("colour", "Colour").autocomplete(colours))
                            .handler(echo),
                    ),
            )
            .command(Command::new("explode", "Explode").handler(explode))
            .command(
                Command::new("locked", "Locked")
                    .check("never", |_ctx: InteractionContext| async { false })
                    .handler(echo),
            )
    }

    fn command(name: &str, options: Value) -> Value {
        json!({
            "id": "1000000000000000000",
            "application_id": "99",
            "type": 2,
            "token": "tok",
            "user": {"id": "5"},
            "data": {"name": name, "type": 1, "options": options},
        })
    }

    fn component(custom_id: &str, message_id: Option<&str>) -> Value {
        let mut payload = json!({
            "id": "1000000000000000000",
            "application_id": "99",
            "type": 3,
            "token": "tok",
            "user": {"id": "5"},
            "data": {"custom_id": custom_id, "component_type": 2},
        });
        if let Some(id) = message_id {
            payload["message"] = json!({"id": id});
        }
        payload
    }

    fn content(response: &InboundResponse) -> String {
        response.as_json().unwrap()["data"]["content"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_ping_is_ponged() {
        let dispatcher = builder().build();
        let response = dispatcher
            .handle(testing::signed(&json!({"id": "1", "type": 1})))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.as_json(), Some(&json!({"type": 1})));
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized() {
        let dispatcher = builder().build();
        let mut request = testing::signed(&json!({"id": "1", "type": 1}));
        request.body = br#"{"id":"1","type":2}"#.to_vec().into();
        let response = dispatcher.handle(request).await;
        assert_eq!(response.status, 401);
        assert_eq!(response.body, InboundBody::Text("invalid request signature".into()));

        let unsigned = InboundRequest::new(None, None, br#"{"type":1}"#.to_vec());
        assert_eq!(dispatcher.handle(unsigned).await.status, 401);
    }

    #[tokio::test]
    async fn test_unknown_type_is_bad_request() {
        let dispatcher = builder().build();
        let response = dispatcher
            .handle(testing::signed(&json!({"id": "1", "type": 42})))
            .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_subcommand_arguments() {
        let dispatcher = builder().build();
        let payload = command(
            "cfg",
            json!([{"name": "sub", "type": 1, "options": [{"name": "x", "type": 3, "value": "y"}]}]),
        );
        let response = dispatcher.handle(testing::signed(&payload)).await;
        assert_eq!(response.status, 200);
        assert_eq!(content(&response), r#"{"x":"y"}"#);
    }

    #[tokio::test]
    async fn test_unknown_command_and_missing_marker() {
        let dispatcher = builder().build();
        let response = dispatcher
            .handle(testing::signed(&command("nope", json!([]))))
            .await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body, InboundBody::Text("command not found".into()));

        let response = dispatcher
            .handle(testing::signed(&command("cfg", json!([]))))
            .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_failed_check_becomes_ephemeral_message() {
        let dispatcher = builder().build();
        let response = dispatcher
            .handle(testing::signed(&command("locked", json!([]))))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(content(&response), "Check never failed.");
        assert_eq!(response.as_json().unwrap()["data"]["flags"], 64);
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_fails_with_500() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = builder()
            .on_interaction_error(move |event: ErrorEvent| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(event.error.to_string());
                }
            })
            .build();

        let response = dispatcher
            .handle(testing::signed(&command("explode", json!([]))))
            .await;
        assert_eq!(response.status, 500);
        assert_eq!(rx.recv().await.unwrap(), "handler panicked: boom");
    }

    #[tokio::test]
    async fn test_autocomplete_is_truncated() {
        let dispatcher = builder().build();
        let payload = json!({
            "id": "1000000000000000000",
            "type": 4,
            "token": "tok",
            "data": {"name": "cfg", "options": [
                {"name": "paint", "type": 1, "options": [
                    {"name": "colour", "type": 3, "value": "re", "focused": true}
                ]}
            ]},
        });
        let response = dispatcher.handle(testing::signed(&payload)).await;
        let body = response.as_json().unwrap();
        assert_eq!(body["type"], 8);
        let choices = body["data"]["choices"].as_array().unwrap();
        assert_eq!(choices.len(), 25);
        assert_eq!(choices[0]["name"], "re0");
    }

    #[tokio::test]
    async fn test_autocomplete_without_focus() {
        let dispatcher = builder().build();
        let payload = json!({
            "id": "1000000000000000000",
            "type": 4,
            "data": {"name": "cfg", "options": [
                {"name": "paint", "type": 1, "options": [{"name": "colour", "type": 3, "value": "re"}]}
            ]},
        });
        let response = dispatcher.handle(testing::signed(&payload)).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body, InboundBody::Text("focused option not found".into()));
    }

    #[tokio::test]
    async fn test_component_routes() {
        let dispatcher = builder()
            .component("exact", |_ctx: InteractionContext| async { Ack::update("exact") })
            .component_regex(r"page:\d+", |ctx: InteractionContext| async move {
                Ack::update(ctx.custom_id().unwrap_or_default().to_string())
            })
            .unwrap()
            .build();

        let response = dispatcher
            .handle(testing::signed(&component("exact", None)))
            .await;
        assert_eq!(content(&response), "exact");

        let response = dispatcher
            .handle(testing::signed(&component("page:3", Some("77"))))
            .await;
        assert_eq!(content(&response), "page:3");

        let response = dispatcher
            .handle(testing::signed(&component("other", None)))
            .await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body, InboundBody::Text("interaction not found".into()));
    }

    #[tokio::test]
    async fn test_waiter_takes_precedence_over_routes() {
        let dispatcher = builder()
            .component("yes", |_ctx: InteractionContext| async { Ack::update("route") })
            .build();

        let waiting = {
            let waiters = dispatcher.waiters().clone();
            tokio::spawn(async move {
                waiters
                    .wait(
                        Snowflake(77),
                        vec![],
                        Duration::from_secs(5),
                        |_ctx: InteractionContext| async { Ack::update("waiter") },
                    )
                    .await
            })
        };
        while !dispatcher.waiters().contains(Snowflake(77)) {
            tokio::task::yield_now().await;
        }

        let response = dispatcher
            .handle(testing::signed(&component("yes", Some("77"))))
            .await;
        assert_eq!(content(&response), "waiter");
        assert!(waiting.await.unwrap().is_some());

        let response = dispatcher
            .handle(testing::signed(&component("yes", Some("77"))))
            .await;
        assert_eq!(content(&response), "route");
    }

    fn modal(custom_id: &str, user_id: &str, value: &str) -> Value {
        json!({
            "id": "1000000000000000000",
            "application_id": "99",
            "type": 5,
            "token": "tok",
            "user": {"id": user_id},
            "message": {"id": "88"},
            "data": {
                "custom_id": custom_id,
                "components": [{
                    "type": 1,
                    "components": [{"type": 4, "custom_id": "reason", "value": value}],
                }],
            },
        })
    }

    #[tokio::test]
    async fn test_modal_submit_routes_and_waits() {
        let dispatcher = builder()
            .component("form", |ctx: InteractionContext| async move {
                let values = ctx.modal_values();
                Ack::message(format!("routed {}", values["reason"]))
            })
            .build();

        let response = dispatcher
            .handle(testing::signed(&modal("form", "9", "first")))
            .await;
        assert_eq!(content(&response), "routed first");

        let waiting = {
            let waiters = dispatcher.waiters().clone();
            tokio::spawn(async move {
                waiters
                    .wait(
                        Snowflake(88),
                        vec![Snowflake(9)],
                        Duration::from_secs(5),
                        |ctx: InteractionContext| async move {
                            Ack::update(ctx.modal_values()["reason"].clone())
                        },
                    )
                    .await
            })
        };
        while !dispatcher.waiters().contains(Snowflake(88)) {
            tokio::task::yield_now().await;
        }

        let refused = dispatcher
            .handle(testing::signed(&modal("form", "10", "intruder")))
            .await;
        let refused = refused.as_json().unwrap();
        assert_eq!(refused["type"], 4);
        assert_eq!(refused["data"]["flags"], 64);
        assert_eq!(refused["data"]["content"], crate::waiter::NOT_ALLOWED_MESSAGE);
        assert!(dispatcher.waiters().contains(Snowflake(88)));

        let response = dispatcher
            .handle(testing::signed(&modal("form", "9", "waited")))
            .await;
        assert_eq!(
            response.as_json(),
            Some(&json!({"type": 7, "data": {"content": "waited"}}))
        );

        let resolved = waiting.await.unwrap().unwrap();
        assert_eq!(resolved.author_id(), Some(Snowflake(9)));
    }

    #[tokio::test]
    async fn test_background_task_runs_after_ack() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = builder()
            .component("later", move |_ctx: InteractionContext| {
                let tx = tx.clone();
                async move {
                    Ack::defer(false, false).then(async move {
                        let _ = tx.send("done");
                        Ok(())
                    })
                }
            })
            .build();

        let response = dispatcher
            .handle(testing::signed(&component("later", None)))
            .await;
        assert_eq!(response.as_json().unwrap()["type"], 6);
        assert_eq!(rx.recv().await, Some("done"));
        assert!(dispatcher.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_tasks() {
        let dispatcher = builder()
            .component("slow", |_ctx: InteractionContext| async {
                Ack::defer(false, false).then(async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                })
            })
            .build();

        dispatcher
            .handle(testing::signed(&component("slow", None)))
            .await;
        assert_eq!(dispatcher.pending_tasks(), 1);
        assert!(dispatcher.shutdown(Duration::from_secs(1)).await);
        assert_eq!(dispatcher.pending_tasks(), 0);
    }

    #[tokio::test]
    async fn test_liveness_reports_readiness() {
        let dispatcher = builder().build();
        let response = dispatcher.liveness();
        assert_eq!(response.status, 503);
        assert_eq!(response.as_json().unwrap()["error"], "bot is not ready yet");

        dispatcher.mark_ready(json!({"id": "1000000000000000000", "username": "hook"}));
        let response = dispatcher.liveness();
        assert_eq!(response.status, 200);
        let body = response.as_json().unwrap();
        assert_eq!(body["@me"]["username"], "hook");
        assert!(body["last_reboot"]["unix"].is_i64());
    }

    #[tokio::test]
    async fn test_tower_service() {
        let dispatcher = builder().build();
        let response = dispatcher
            .oneshot(testing::signed(&json!({"id": "1", "type": 1})))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_commands_json_sorted() {
        let dispatcher = builder().build();
        let names: Vec<String> = dispatcher
            .commands_json()
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["cfg", "explode", "locked"]);
    }

    #[test]
    fn test_uptime_format() {
        assert_eq!(format_uptime(chrono::TimeDelta::seconds(3723)), "1:02:03");
    }
}
