//! Error types for the Hookline framework.

use std::time::Duration;

use hookline_core::HttpError;
use thiserror::Error;

/// Errors returned by command, component and autocomplete handlers.
///
/// The dispatcher reports every handler error to the `interaction_error`
/// listeners (or the log) and then asks the error responder for an ack.
/// By default checks, cooldowns and missing permissions produce an
/// ephemeral message; everything else becomes a `500`.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A command check returned `false`.
    #[error("{0}")]
    CheckFailed(String),

    /// The command's cooldown window is exhausted.
    #[error("Command is on cooldown for {:.2}s", retry_after.as_secs_f64())]
    OnCooldown {
        /// Time until the window resets.
        retry_after: Duration,
    },

    /// The invoking member lacks the listed permission bits.
    #[error("You are missing permissions to run this command ({0:#x})")]
    UserMissingPermissions(u64),

    /// The application lacks the listed permission bits in this channel.
    #[error("The bot is missing permissions to run this command ({0:#x})")]
    BotMissingPermissions(u64),

    /// An API call made by the handler failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Neither the interaction nor the client carries an application id,
    /// so no follow-up webhook can be addressed.
    #[error("no application id known for follow-up calls")]
    MissingApplicationId,

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panic(String),

    /// Any other failure.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Whether the error is meant to be shown to the invoking user.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::CheckFailed(_)
                | Self::OnCooldown { .. }
                | Self::UserMissingPermissions(_)
                | Self::BotMissingPermissions(_)
        )
    }

    /// Creates a check failure with a user-facing message.
    pub fn check_failed(msg: impl Into<String>) -> Self {
        Self::CheckFailed(msg.into())
    }

    /// Wraps any error.
    pub fn other(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(error.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::other(error)
    }
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, HandlerError>;
