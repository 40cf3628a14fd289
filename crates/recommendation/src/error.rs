//! Recommendation error types.

use pricing::PolicyError;
use thiserror::Error;
use upstream::UpstreamError;
use venue_store::VenueStoreError;

/// Errors that can occur while assembling recommendations.
#[derive(Debug, Error)]
pub enum RecommendationError {
    /// The profile service does not know the user.
    #[error("User not found: {0}")]
    UserNotFound(i64),

    /// The profile or catalog service failed.
    #[error("Upstream error: {0}")]
    Upstream(UpstreamError),

    /// The region name is blank.
    #[error("Invalid region name: {0:?}")]
    InvalidRegion(String),

    /// The venue store failed.
    #[error("Venue store error: {0}")]
    Store(#[from] VenueStoreError),

    /// No discount policy was loaded at start-up.
    #[error("Discount policy is not available")]
    PolicyUnavailable,

    /// The discount policy could not be evaluated for a tier.
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),
}

impl From<UpstreamError> for RecommendationError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::UserNotFound(user_id) => Self::UserNotFound(user_id),
            other => Self::Upstream(other),
        }
    }
}

/// Result type for recommendation operations.
pub type Result<T> = std::result::Result<T, RecommendationError>;
