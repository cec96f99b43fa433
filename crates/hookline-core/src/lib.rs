//! # Hookline Core
//!
//! Shared building blocks of the Hookline interactions framework.
//!
//! This crate holds the types every other layer agrees on:
//!
//! - **Envelope**: the decoded inbound interaction ([`Interaction`]) with its
//!   options tree and resolved-entity maps
//! - **Acknowledgements**: the synchronous JSON replies ([`InteractionResponse`])
//! - **Errors**: outbound API failures ([`HttpError`]) and inbound validation
//!   failures ([`InteractionError`])
//! - **Inbound seam**: the [`InteractionHandler`] trait the HTTP endpoint
//!   calls into, implemented by the framework dispatcher
//!
//! ## Layering
//!
//! ```text
//! ┌──────────────────────┐
//! │  hookline-runtime    │  config, logging, serve loop
//! ├──────────────────────┤
//! │  hookline-framework  │  dispatcher, commands, waiters
//! ├──────────────────────┤
//! │  hookline-transport  │  rate-limited client, endpoint
//! ├──────────────────────┤
//! │  hookline-core       │  <- this crate
//! └──────────────────────┘
//! ```

pub mod error;
pub mod handler;
pub mod interaction;
pub mod response;
pub mod snowflake;

pub use error::{ErrorResponse, HttpError, HttpResult, InteractionError, InteractionResult};
pub use handler::{
    BoxedInteractionHandler, InboundBody, InboundRequest, InboundResponse, InteractionHandler,
    SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use interaction::{
    CommandOption, CommandType, Interaction, InteractionData, InteractionType, OptionType,
    Resolved,
};
pub use response::{Choice, MessageData, MessageFlags, ResponseType, InteractionResponse};
pub use snowflake::Snowflake;

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::*;
    pub use super::interaction::*;
    pub use super::response::*;
    pub use super::snowflake::Snowflake;
}
