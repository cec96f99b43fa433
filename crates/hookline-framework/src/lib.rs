//! # Hookline Framework
//!
//! Routing and handler layer of the Hookline interactions framework.
//!
//! ## Overview
//!
//! - [`Dispatcher`]: authenticates deliveries and routes them to commands,
//!   component routes, autocomplete callbacks and waiters
//! - [`Command`] / [`OptionSpec`]: the command tree, its checks, cooldowns
//!   and registration payloads
//! - [`InteractionContext`]: what a handler sees about one interaction
//! - [`WaiterRegistry`]: suspends a handler until the next interaction on a
//!   message
//! - [`Ack`]: the synchronous reply, optionally with background work
//!
//! ## Example
//!
//! ```rust,ignore
//! use hookline_framework::prelude::*;
//!
//! async fn ping(_ctx: InteractionContext, _args: Arguments) -> Ack {
//!     Ack::message("Pong!")
//! }
//!
//! let dispatcher = Dispatcher::builder(client)
//!     .verifier(verifier)
//!     .command(Command::new("ping", "Replies with pong").handler(ping))
//!     .build();
//! ```

pub mod arguments;
pub mod command;
pub mod component;
pub mod context;
pub mod cooldown;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod listener;
pub mod waiter;

#[cfg(test)]
mod testing;

pub use arguments::{ArgValue, Arguments};
pub use command::{ADMINISTRATOR, Command, OptionSpec, commands_json};
pub use component::ComponentRegistry;
pub use context::InteractionContext;
pub use cooldown::{BucketType, Cooldown};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{HandlerError, HandlerResult};
pub use handler::{
    Ack, AutocompleteHandler, BoxedAutocompleteHandler, BoxedCheck, BoxedCommandHandler,
    BoxedComponentHandler, Check, CommandHandler, ComponentHandler, HandlerOutput,
};
pub use listener::{
    ErrorEvent, ErrorResponder, Listener, Listeners, PingEvent, RawEvent, default_error_responder,
};
pub use waiter::{NOT_ALLOWED_MESSAGE, WaiterRegistry};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Ack, ArgValue, Arguments, BucketType, Command, Dispatcher, ErrorEvent, HandlerError,
        HandlerResult, InteractionContext, OptionSpec, PingEvent,
    };
    pub use hookline_core::{Choice, InteractionResponse, MessageData, MessageFlags, Snowflake};
}
