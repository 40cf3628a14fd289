use async_trait::async_trait;

use crate::{Result, Venue, VenueName, VenueStatus};

/// Core trait for venue store implementations.
///
/// Plain reads go straight to the store. Every write goes through a
/// [`VenueTransaction`] obtained from [`VenueStore::begin`], so that a
/// fetch-lock-decide-write sequence either commits completely or not at all.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait VenueStore: Send + Sync {
    /// Transaction type handed out by [`VenueStore::begin`].
    type Tx: VenueTransaction;

    /// Starts a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Fetches a live venue by exact (case-sensitive) name.
    async fn find_by_name(&self, name: &VenueName) -> Result<Option<Venue>>;

    /// Fetches all live venues, ordered by id.
    async fn find_all(&self) -> Result<Vec<Venue>>;
}

/// A single store transaction.
///
/// Dropping a transaction without calling [`VenueTransaction::commit`]
/// rolls back everything it wrote.
#[async_trait]
pub trait VenueTransaction: Send {
    /// Takes the global first-sold-out lock for the rest of this transaction.
    ///
    /// While held, no other transaction can read or change which venue
    /// holds the marker.
    async fn lock_first_sold_out(&mut self) -> Result<()>;

    /// Fetches a venue by name and locks its row, including soft-deleted rows.
    async fn find_for_update(&mut self, name: &VenueName) -> Result<Option<Venue>>;

    /// Returns the live venue holding the first-sold-out marker, ignoring `excluding`.
    async fn first_sold_out_holder(&mut self, excluding: &VenueName)
    -> Result<Option<VenueName>>;

    /// Clears the first-sold-out marker on every venue except `keep`.
    ///
    /// Returns the number of venues that lost the marker.
    async fn release_first_sold_out(&mut self, keep: &VenueName) -> Result<u64>;

    /// Inserts a new venue row.
    async fn insert(&mut self, name: &VenueName, status: VenueStatus) -> Result<Venue>;

    /// Updates an existing row in place. A soft-deleted row is restored.
    async fn update(&mut self, existing: &Venue, status: VenueStatus) -> Result<Venue>;

    /// Commits every write made in this transaction.
    async fn commit(self) -> Result<()>;
}
