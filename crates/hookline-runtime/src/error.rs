//! Runtime error types.

use hookline_core::HttpError;
use hookline_transport::KeyError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting or running the application.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured public key could not be loaded.
    #[error("Invalid public key: {0}")]
    Key(#[from] KeyError),

    /// A start-up API call failed.
    #[error("API call failed: {0}")]
    Http(#[from] HttpError),

    /// Binding or serving the endpoint failed.
    #[error("Endpoint error: {0}")]
    Io(#[from] std::io::Error),

    /// The server task panicked or was aborted.
    #[error("Server task failed: {0}")]
    Task(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
