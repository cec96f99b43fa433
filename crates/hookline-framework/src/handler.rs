//! Handler traits for commands, components, autocomplete and checks.
//!
//! Handlers are ordinary async closures or functions. Blanket
//! implementations turn anything with the right shape into a handler, much
//! like axum's handler system:
//!
//! ```rust,ignore
//! async fn ping(_ctx: InteractionContext, _args: Arguments) -> Ack {
//!     Ack::message("Pong!")
//! }
//!
//! async fn confirm(ctx: InteractionContext) -> HandlerResult<Ack> {
//!     let user = ctx.author_id().ok_or_else(|| HandlerError::other("no author"))?;
//!     Ok(Ack::update(format!("Confirmed by {user}")))
//! }
//! ```
//!
//! A handler returns anything implementing [`HandlerOutput`]: an [`Ack`], an
//! [`InteractionResponse`] or a `Result` of either.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use hookline_core::{Choice, InteractionResponse, MessageData};

use crate::arguments::Arguments;
use crate::context::InteractionContext;
use crate::error::{HandlerError, HandlerResult};

// ============================================================================
// Ack
// ============================================================================

/// The synchronous acknowledgement of an interaction, optionally with work to
/// run after it has been sent.
pub struct Ack {
    response: InteractionResponse,
    then: Option<BoxFuture<'static, HandlerResult<()>>>,
}

impl Ack {
    pub fn new(response: InteractionResponse) -> Self {
        Self {
            response,
            then: None,
        }
    }

    /// Replies with a new message.
    pub fn message(message: impl Into<MessageData>) -> Self {
        Self::new(InteractionResponse::message(message))
    }

    /// Replies with a message only the invoking user can see.
    pub fn ephemeral(message: impl Into<MessageData>) -> Self {
        Self::new(InteractionResponse::ephemeral(message))
    }

    /// Edits the message a component is attached to.
    pub fn update(message: impl Into<MessageData>) -> Self {
        Self::new(InteractionResponse::update(message))
    }

    /// Defers the reply; see [`InteractionResponse::defer`].
    pub fn defer(ephemeral: bool, thinking: bool) -> Self {
        Self::new(InteractionResponse::defer(ephemeral, thinking))
    }

    /// Opens a modal.
    pub fn modal(
        custom_id: impl Into<String>,
        title: impl Into<String>,
        components: Vec<serde_json::Value>,
    ) -> Self {
        Self::new(InteractionResponse::modal(custom_id, title, components))
    }

    /// Runs `task` in the background once the ack has been returned.
    ///
    /// The task is tracked by the dispatcher and cancelled on shutdown; its
    /// error, if any, goes through the same error hook as a handler error.
    pub fn then<F>(mut self, task: F) -> Self
    where
        F: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.then = Some(task.boxed());
        self
    }

    pub fn response(&self) -> &InteractionResponse {
        &self.response
    }

    pub fn has_task(&self) -> bool {
        self.then.is_some()
    }

    pub fn into_parts(
        self,
    ) -> (
        InteractionResponse,
        Option<BoxFuture<'static, HandlerResult<()>>>,
    ) {
        (self.response, self.then)
    }
}

impl fmt::Debug for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ack")
            .field("response", &self.response)
            .field("then", &self.then.is_some())
            .finish()
    }
}

impl From<InteractionResponse> for Ack {
    fn from(response: InteractionResponse) -> Self {
        Self::new(response)
    }
}

// ============================================================================
// HandlerOutput
// ============================================================================

/// Values a command or component handler may return.
pub trait HandlerOutput: Send + 'static {
    fn into_ack(self) -> HandlerResult<Ack>;
}

impl HandlerOutput for Ack {
    fn into_ack(self) -> HandlerResult<Ack> {
        Ok(self)
    }
}

impl HandlerOutput for InteractionResponse {
    fn into_ack(self) -> HandlerResult<Ack> {
        Ok(Ack::new(self))
    }
}

impl<T, E> HandlerOutput for Result<T, E>
where
    T: Into<Ack> + Send + 'static,
    E: Into<HandlerError> + Send + 'static,
{
    fn into_ack(self) -> HandlerResult<Ack> {
        self.map(Into::into).map_err(Into::into)
    }
}

// ============================================================================
// Handler traits
// ============================================================================

/// Handles a slash or context-menu command.
pub trait CommandHandler: Send + Sync + 'static {
    fn call(&self, ctx: InteractionContext, args: Arguments) -> BoxFuture<'static, HandlerResult<Ack>>;
}

impl<F, Fut, R> CommandHandler for F
where
    F: Fn(InteractionContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
    fn call(&self, ctx: InteractionContext, args: Arguments) -> BoxFuture<'static, HandlerResult<Ack>> {
        (self)(ctx, args).map(HandlerOutput::into_ack).boxed()
    }
}

/// Handles a component click, a select menu or a modal submission.
///
/// Also used as the follow-up handler of an interaction waiter.
pub trait ComponentHandler: Send + Sync + 'static {
    fn call(&self, ctx: InteractionContext) -> BoxFuture<'static, HandlerResult<Ack>>;
}

impl<F, Fut, R> ComponentHandler for F
where
    F: Fn(InteractionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
    fn call(&self, ctx: InteractionContext) -> BoxFuture<'static, HandlerResult<Ack>> {
        (self)(ctx).map(HandlerOutput::into_ack).boxed()
    }
}

/// Produces suggestions for the option the user is typing into.
///
/// Receives the current (partial) value as a string.
pub trait AutocompleteHandler: Send + Sync + 'static {
    fn call(&self, ctx: InteractionContext, current: String) -> BoxFuture<'static, HandlerResult<Vec<Choice>>>;
}

impl<F, Fut> AutocompleteHandler for F
where
    F: Fn(InteractionContext, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<Vec<Choice>>> + Send + 'static,
{
    fn call(&self, ctx: InteractionContext, current: String) -> BoxFuture<'static, HandlerResult<Vec<Choice>>> {
        (self)(ctx, current).boxed()
    }
}

/// A predicate that must hold before a command runs.
pub trait Check: Send + Sync + 'static {
    fn check(&self, ctx: InteractionContext) -> BoxFuture<'static, bool>;
}

impl<F, Fut> Check for F
where
    F: Fn(InteractionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    fn check(&self, ctx: InteractionContext) -> BoxFuture<'static, bool> {
        (self)(ctx).boxed()
    }
}

pub type BoxedCommandHandler = Arc<dyn CommandHandler>;
pub type BoxedComponentHandler = Arc<dyn ComponentHandler>;
pub type BoxedAutocompleteHandler = Arc<dyn AutocompleteHandler>;
pub type BoxedCheck = Arc<dyn Check>;
