//! Clients for the services this one depends on.
//!
//! - [`ProfileClient`] resolves a user id to a profile (and so a region)
//! - [`CatalogClient`] lists the ticket tiers on sale in a region
//!
//! Each trait has an HTTP implementation guarded by a [`CircuitBreaker`]
//! and an in-memory implementation for tests.

pub mod catalog;
pub mod circuit_breaker;
pub mod error;
pub mod http;
pub mod profile;

pub use catalog::{CatalogClient, InMemoryCatalogClient, TicketTier};
pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig, Rejected};
pub use error::{Result, UpstreamError};
pub use http::{HttpCatalogClient, HttpClientConfig, HttpProfileClient, ServiceEndpoint};
pub use profile::{InMemoryProfileClient, ProfileClient, UserProfile};
