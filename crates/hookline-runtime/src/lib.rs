//! Hookline Runtime - configuration, logging and serving.
//!
//! This crate provides:
//! - Layered configuration (`HooklineConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - The application runtime (`HooklineRuntime`)
//!
//! ```ignore
//! use hookline_runtime::HooklineRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HooklineRuntime::builder().build()?;
//!     let dispatcher = runtime.dispatcher().command(ping()).build();
//!
//!     // Run until Ctrl+C
//!     runtime.run(dispatcher).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, HooklineConfig, validate_config};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents, init_from_config};
pub use runtime::{HooklineRuntime, RuntimeBuilder};

// Re-export tracing for use by applications
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for applications.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
