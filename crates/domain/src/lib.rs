//! Domain layer for venue status reconciliation.
//!
//! This crate provides:
//! - the inbound status-change event payloads
//! - the reconciler that applies them while keeping at most one venue
//!   marked as first sold out

pub mod error;
pub mod events;
pub mod reconciler;

pub use error::{ReconcileError, Result};
pub use events::{StatusChangeEvent, TicketSoldOutSignal, VenueStatusUpdate};
pub use reconciler::{ReconcilerConfig, VenueStatusReconciler};
