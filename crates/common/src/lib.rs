//! Shared identifiers used across the venue recommendation workspace.

pub mod types;

pub use types::{CorrelationId, InvalidVenueName, VenueName};
