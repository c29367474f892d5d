//! Error types for the dispatch engine.
//!
//! Every variant except [`NotifyError::InvalidInput`] is scoped to a single
//! channel: the dispatcher turns it into a failed [`NotificationResult`]
//! instead of aborting the batch.
//!
//! [`NotificationResult`]: crate::core::NotificationResult

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotifyError {
    /// A channel setting is missing or invalid. Raised when the channel is
    /// built, before any delivery.
    #[error("invalid channel configuration: {0}")]
    Configuration(String),

    /// No notifier is registered for the channel kind.
    #[error("unknown channel kind '{0}'")]
    UnknownKind(String),

    /// A template could not be evaluated.
    #[error("template rendering failed: {0}")]
    Render(String),

    /// The payload could not be encoded into the provider's wire format.
    #[error("payload serialization failed: {0}")]
    Serialization(String),

    /// The transport could not deliver the payload.
    #[error("delivery failed: {0}")]
    Transport(String),

    /// The provider answered with a non-success status code.
    #[error("delivery failed: endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The transport did not answer within the channel timeout.
    #[error("delivery timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The dispatch was cancelled before this channel finished.
    #[error("dispatch cancelled")]
    Cancelled,

    /// The input to the dispatcher as a whole is unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for NotifyError {
    fn from(e: serde_json::Error) -> Self {
        NotifyError::Serialization(e.to_string())
    }
}

impl NotifyError {
    /// Maps the error onto the coarse failure category reported in results.
    pub fn reason(&self) -> FailureReason {
        match self {
            NotifyError::Configuration(_) | NotifyError::UnknownKind(_) => {
                FailureReason::Configuration
            }
            NotifyError::Render(_) => FailureReason::Render,
            NotifyError::Serialization(_) => FailureReason::Serialization,
            NotifyError::Transport(_) | NotifyError::Status { .. } => FailureReason::Transport,
            NotifyError::Timeout(_) => FailureReason::Timeout,
            NotifyError::Cancelled => FailureReason::Cancelled,
            NotifyError::InvalidInput(_) => FailureReason::InvalidInput,
        }
    }
}

/// Why a channel ended in the `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Configuration,
    Render,
    Serialization,
    Transport,
    Timeout,
    Cancelled,
    InvalidInput,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::Configuration => "configuration",
            FailureReason::Render => "render",
            FailureReason::Serialization => "serialization",
            FailureReason::Transport => "transport",
            FailureReason::Timeout => "timeout",
            FailureReason::Cancelled => "cancelled",
            FailureReason::InvalidInput => "invalid_input",
        };
        f.write_str(s)
    }
}

/// Convenience `Result` alias for engine operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
