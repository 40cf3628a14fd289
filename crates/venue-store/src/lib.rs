pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod venue;

pub use common::VenueName;
pub use error::{Result, VenueStoreError};
pub use memory::{InMemoryTransaction, InMemoryVenueStore};
pub use postgres::{PostgresTransaction, PostgresVenueStore};
pub use store::{VenueStore, VenueTransaction};
pub use venue::{Venue, VenueId, VenueStatus};
