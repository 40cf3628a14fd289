//! Upstream error types.

use thiserror::Error;

/// Errors returned by the profile and catalog clients.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The profile service does not know this user.
    #[error("User profile not found: {0}")]
    UserNotFound(i64),

    /// The service answered with a non-success status.
    #[error("{service} responded with status {status}")]
    Status { service: &'static str, status: u16 },

    /// The request never produced a response (connect error, timeout).
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// The circuit breaker is open and the call was not attempted.
    #[error("{service} is unavailable: circuit breaker open")]
    CircuitOpen { service: &'static str },
}

impl UpstreamError {
    /// Returns true for failures that say something about upstream health.
    ///
    /// Only these count towards opening the circuit breaker; a 404 for an
    /// unknown user is a healthy answer.
    pub fn is_upstream_fault(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::UserNotFound(_) | Self::Decode { .. } | Self::CircuitOpen { .. } => false,
        }
    }
}

/// Result type for upstream calls.
pub type Result<T> = std::result::Result<T, UpstreamError>;
