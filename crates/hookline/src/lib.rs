//! # Hookline
//!
//! A framework for bots that receive their interactions as signed HTTP
//! webhooks and talk back through a rate-limited REST client.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  POST  ┌──────────────────┐     ┌────────────┐     ┌──────────────────┐
//! │ Platform │───────▶│ InteractionServer│────▶│ Dispatcher │────▶│ commands         │
//! │          │◀───────│   (axum)         │◀────│  verify    │────▶│ component routes │
//! └──────────┘  ack   └──────────────────┘     │  route     │────▶│ autocomplete     │
//!      ▲                                       │  waiters   │────▶│ waiters          │
//!      │          ┌────────────────────┐       └────────────┘     └──────────────────┘
//!      └──────────│ HttpClient         │◀──────── follow-ups, edits, command sync
//!                 │ per-route buckets  │
//!                 └────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, sets up logging, serves the endpoint
//! - **Dispatcher**: authenticates deliveries and routes them to handlers
//! - **Handlers**: async functions returning an [`Ack`](prelude::Ack), the
//!   synchronous reply, optionally carrying background work
//! - **HttpClient**: outbound API calls that respect per-route rate limits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hookline::prelude::*;
//!
//! async fn ping(_ctx: InteractionContext, _args: Arguments) -> Ack {
//!     Ack::message("Pong!")
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HooklineRuntime::builder().build()?;
//!     let dispatcher = runtime
//!         .dispatcher()
//!         .command(Command::new("ping", "Replies with pong").handler(ping))
//!         .build();
//!
//!     runtime.run(dispatcher).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: `hookline.toml` configuration files
//! - `yaml-config`: `hookline.yaml` configuration files
//! - `json-log`: JSON log output

pub use hookline_core as core;
pub use hookline_framework as framework;
pub use hookline_runtime as runtime;
pub use hookline_transport as transport;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry point
    pub use hookline_runtime::{HooklineConfig, HooklineRuntime};

    // Routing and handlers
    pub use hookline_framework::prelude::*;
    pub use hookline_framework::{ComponentHandler, RawEvent, WaiterRegistry};

    // Outbound API
    pub use hookline_transport::{Followup, HttpClient, Method, Route};
}
