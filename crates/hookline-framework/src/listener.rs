//! Event listeners and the error responder.
//!
//! Listeners observe what the dispatcher does without influencing the ack.
//! They run as tracked background tasks.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use hookline_core::Interaction;
use serde_json::Value;

use crate::context::InteractionContext;
use crate::error::HandlerError;
use crate::handler::Ack;

/// Fired for every ping.
#[derive(Debug, Clone)]
pub struct PingEvent {
    pub interaction: Arc<Interaction>,
}

/// Fired when a handler, check or background task fails.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub ctx: InteractionContext,
    pub error: Arc<HandlerError>,
}

/// Fired with every raw payload when debug events are enabled.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub payload: Arc<Value>,
}

/// An async callback for one event type.
pub trait Listener<E>: Send + Sync + 'static {
    fn call(&self, event: E) -> BoxFuture<'static, ()>;
}

impl<E, F, Fut> Listener<E> for F
where
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    fn call(&self, event: E) -> BoxFuture<'static, ()> {
        (self)(event).boxed()
    }
}

pub type BoxedListener<E> = Arc<dyn Listener<E>>;

/// Turns a handler error into the ack sent to the user, if any.
pub type ErrorResponder = Arc<dyn Fn(&InteractionContext, &HandlerError) -> Option<Ack> + Send + Sync>;

/// Replies ephemerally to errors meant for the user; everything else gets
/// no ack, which the dispatcher turns into a `500`.
pub fn default_error_responder(_ctx: &InteractionContext, error: &HandlerError) -> Option<Ack> {
    error
        .is_user_facing()
        .then(|| Ack::ephemeral(error.to_string()))
}

/// All registered listeners.
#[derive(Clone, Default)]
pub struct Listeners {
    pub(crate) ping: Vec<BoxedListener<PingEvent>>,
    pub(crate) interaction_error: Vec<BoxedListener<ErrorEvent>>,
    pub(crate) raw_interaction: Vec<BoxedListener<RawEvent>>,
}

impl Listeners {
    pub fn on_ping(&mut self, listener: impl Listener<PingEvent>) {
        self.ping.push(Arc::new(listener));
    }

    pub fn on_interaction_error(&mut self, listener: impl Listener<ErrorEvent>) {
        self.interaction_error.push(Arc::new(listener));
    }

    pub fn on_raw_interaction(&mut self, listener: impl Listener<RawEvent>) {
        self.raw_interaction.push(Arc::new(listener));
    }

    pub fn has_ping(&self) -> bool {
        !self.ping.is_empty()
    }

    pub fn has_interaction_error(&self) -> bool {
        !self.interaction_error.is_empty()
    }

    pub fn has_raw_interaction(&self) -> bool {
        !self.raw_interaction.is_empty()
    }
}
