use thiserror::Error;

use crate::VenueName;

/// Errors that can occur when interacting with the venue store.
#[derive(Debug, Error)]
pub enum VenueStoreError {
    /// A second live venue tried to take the first-sold-out marker.
    /// Raised by the store's own uniqueness guard.
    #[error("Venue {venue} cannot take the first-sold-out marker: another venue holds it")]
    FirstSoldOutConflict { venue: VenueName },

    /// The store cannot be reached.
    #[error("Venue store unavailable: {0}")]
    Unavailable(String),

    /// A row could not be mapped to a venue.
    #[error("Invalid venue row: {0}")]
    InvalidRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl VenueStoreError {
    /// Returns true when repeating the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::FirstSoldOutConflict { .. } | Self::Unavailable(_) => true,
            Self::InvalidRow(_) => false,
            Self::Database(e) => is_transient(e),
        }
    }
}

/// Connection loss, pool exhaustion and lock contention clear up on their
/// own; decode failures and constraint violations do not.
fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| is_transient_sqlstate(&code)),
        _ => false,
    }
}

// serialization_failure, deadlock_detected, lock_not_available,
// admin_shutdown, and the connection exception class.
fn is_transient_sqlstate(code: &str) -> bool {
    matches!(code, "40001" | "40P01" | "55P03" | "57P01") || code.starts_with("08")
}

/// Result type for venue store operations.
pub type Result<T> = std::result::Result<T, VenueStoreError>;
