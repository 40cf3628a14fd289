//! Messaging error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by brokers and the router.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The broker has been closed.
    #[error("Broker is closed")]
    Closed,

    /// The broker could not be reached.
    #[error("Broker connection failed: {0}")]
    Connection(String),

    /// A subscription could not be set up.
    #[error("Failed to subscribe to {topic}: {message}")]
    Subscribe { topic: String, message: String },

    /// A message could not be published.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whether a handler failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retrying cannot help (bad payload, failed validation).
    Permanent,
    /// The same message may succeed later (store down, timeout).
    Transient,
}

/// Failure reported by a message handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Permanent(String),

    #[error("{0}")]
    Transient(String),
}

impl HandlerError {
    pub fn permanent(reason: impl std::fmt::Display) -> Self {
        Self::Permanent(reason.to_string())
    }

    pub fn transient(reason: impl std::fmt::Display) -> Self {
        Self::Transient(reason.to_string())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Permanent(_) => FailureKind::Permanent,
            Self::Transient(_) => FailureKind::Transient,
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind() == FailureKind::Permanent
    }
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Result type returned by message handlers.
pub type HandlerResult = std::result::Result<(), HandlerError>;
