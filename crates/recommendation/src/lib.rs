//! Ticket recommendations.
//!
//! For a user, the assembler looks up the profile region, the venue status
//! for that region and the region's ticket tiers, then runs every tier
//! through the discount policy:
//! 1. Fetch the user profile
//! 2. Fetch the venue status (an unseen venue has never sold out)
//! 3. Fetch the ticket tiers
//! 4. Evaluate the discount policy per tier
//!
//! Any upstream failure aborts the whole request.

pub mod assembler;
pub mod error;
pub mod model;

pub use assembler::RecommendationAssembler;
pub use error::{RecommendationError, Result};
pub use model::{OnlineTicketStatus, Recommendation, discount_percentage};
