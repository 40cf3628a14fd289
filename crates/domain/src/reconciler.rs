//! Venue status reconciler.
//!
//! Applies status-change events to the venue store while keeping the
//! first-sold-out marker on at most one live venue at a time.
//!
//! Every write runs as one transaction that first takes the store's global
//! first-sold-out lock, then locks the venue row, decides the new flags and
//! writes them. Concurrent updates are therefore totally ordered and the
//! "is anyone else the holder" check cannot race with another claim.

use std::future::Future;
use std::time::Duration;

use common::VenueName;
use venue_store::{Venue, VenueStatus, VenueStore, VenueTransaction};

use crate::error::{ReconcileError, Result};
use crate::events::StatusChangeEvent;

/// Reconciler settings.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Deadline for one fetch-lock-decide-write transaction.
    pub tx_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tx_timeout: Duration::from_secs(5),
        }
    }
}

/// Applies venue status changes to a [`VenueStore`].
pub struct VenueStatusReconciler<S: VenueStore> {
    store: S,
    config: ReconcilerConfig,
}

impl<S: VenueStore> VenueStatusReconciler<S> {
    /// Creates a reconciler with default settings.
    pub fn new(store: S) -> Self {
        Self::with_config(store, ReconcilerConfig::default())
    }

    pub fn with_config(store: S, config: ReconcilerConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies any status-change event.
    pub async fn apply(&self, event: &StatusChangeEvent) -> Result<Venue> {
        match event {
            StatusChangeEvent::VenueStatusUpdate(e) => {
                self.apply_explicit_status(&e.venue_name, e.is_sold_out, e.is_first_sold_out)
                    .await
            }
            StatusChangeEvent::TicketSoldOutSignal(e) => {
                self.apply_sold_out_signal(&e.venue_name, e.is_sold_out)
                    .await
            }
        }
    }

    /// Writes both flags exactly as given.
    ///
    /// Asserting `is_first_sold_out = true` moves the marker to this venue:
    /// any other holder is cleared in the same transaction.
    #[tracing::instrument(skip(self))]
    pub async fn apply_explicit_status(
        &self,
        venue_name: &str,
        is_sold_out: bool,
        is_first_sold_out: bool,
    ) -> Result<Venue> {
        let name = VenueName::parse(venue_name)?;
        let status = VenueStatus::new(is_sold_out, is_first_sold_out);

        let venue = self
            .with_deadline(self.write_explicit(&name, status))
            .await?;

        metrics::counter!("venue_status_updates_total", "path" => "explicit").increment(1);
        tracing::info!(
            venue = %venue.name,
            sold_out = venue.sold_out,
            first_sold_out = venue.first_sold_out,
            "Venue status overwritten"
        );
        Ok(venue)
    }

    /// Sets the sold-out flag and derives the first-sold-out flag.
    ///
    /// The venue holds the marker unless some other live venue already does.
    /// Re-applying a signal to the current holder keeps it the holder.
    #[tracing::instrument(skip(self))]
    pub async fn apply_sold_out_signal(&self, venue_name: &str, is_sold_out: bool) -> Result<Venue> {
        let name = VenueName::parse(venue_name)?;

        let venue = self
            .with_deadline(self.write_signal(&name, is_sold_out))
            .await?;

        metrics::counter!("venue_status_updates_total", "path" => "signal").increment(1);
        tracing::info!(
            venue = %venue.name,
            sold_out = venue.sold_out,
            first_sold_out = venue.first_sold_out,
            "Sold-out signal applied"
        );
        Ok(venue)
    }

    async fn write_explicit(&self, name: &VenueName, status: VenueStatus) -> Result<Venue> {
        let mut tx = self.store.begin().await?;
        tx.lock_first_sold_out().await?;

        let existing = tx.find_for_update(name).await?;
        if status.first_sold_out {
            let released = tx.release_first_sold_out(name).await?;
            if released > 0 {
                tracing::info!(venue = %name, released, "First-sold-out marker transferred");
            }
        }

        let claimed = status.first_sold_out && !holds_marker(existing.as_ref());
        let venue = upsert(&mut tx, name, existing, status).await?;
        tx.commit().await?;

        if claimed {
            metrics::counter!("first_sold_out_claims_total").increment(1);
        }
        Ok(venue)
    }

    async fn write_signal(&self, name: &VenueName, is_sold_out: bool) -> Result<Venue> {
        let mut tx = self.store.begin().await?;
        tx.lock_first_sold_out().await?;

        let existing = tx.find_for_update(name).await?;
        let holder = tx.first_sold_out_holder(name).await?;
        if let Some(holder) = &holder {
            tracing::debug!(venue = %name, %holder, "Another venue holds the first-sold-out marker");
        }

        let status = VenueStatus::new(is_sold_out, holder.is_none());
        let claimed = status.first_sold_out && !holds_marker(existing.as_ref());
        let venue = upsert(&mut tx, name, existing, status).await?;
        tx.commit().await?;

        if claimed {
            metrics::counter!("first_sold_out_claims_total").increment(1);
            tracing::info!(venue = %name, "Venue claimed the first-sold-out marker");
        }
        Ok(venue)
    }

    /// Runs `write` under the transaction deadline. On expiry the future,
    /// and with it the open transaction, is dropped, which rolls it back.
    async fn with_deadline<F>(&self, write: F) -> Result<Venue>
    where
        F: Future<Output = Result<Venue>>,
    {
        let timeout = self.config.tx_timeout;
        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(?timeout, "Venue status transaction timed out");
                Err(ReconcileError::Timeout(timeout))
            }
        }
    }
}

fn holds_marker(venue: Option<&Venue>) -> bool {
    venue.is_some_and(|v| v.first_sold_out && v.is_live())
}

async fn upsert<T: VenueTransaction>(
    tx: &mut T,
    name: &VenueName,
    existing: Option<Venue>,
    status: VenueStatus,
) -> Result<Venue> {
    let venue = match existing {
        Some(existing) => tx.update(&existing, status).await?,
        None => tx.insert(name, status).await?,
    };
    Ok(venue)
}
