//! Domain error types.

use std::time::Duration;

use common::InvalidVenueName;
use thiserror::Error;
use venue_store::VenueStoreError;

/// Errors that can occur while applying a status change.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The event was rejected before touching the store.
    #[error("Invalid status change: {0}")]
    Validation(String),

    /// An error occurred in the venue store.
    #[error("Venue store error: {0}")]
    Store(#[from] VenueStoreError),

    /// The transaction did not finish before its deadline and was rolled back.
    #[error("Status change timed out after {0:?}")]
    Timeout(Duration),
}

impl ReconcileError {
    /// Returns true when applying the same event again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Store(e) => e.is_retryable(),
            Self::Timeout(_) => true,
        }
    }
}

impl From<InvalidVenueName> for ReconcileError {
    fn from(e: InvalidVenueName) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
