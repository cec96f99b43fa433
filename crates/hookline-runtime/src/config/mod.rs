//! Configuration for the Hookline runtime.
//!
//! Settings are layered with figment from defaults, TOML/YAML files and
//! `HOOKLINE_*` environment variables, then checked by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    BotConfig, HooklineConfig, HttpConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    ServerConfig, SpanEventConfig,
};
pub use validation::validate_config;
