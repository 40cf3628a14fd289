use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, Venue, VenueId, VenueName, VenueStatus, VenueStoreError,
    store::{VenueStore, VenueTransaction},
};

#[derive(Debug, Default)]
struct Table {
    rows: HashMap<VenueName, Venue>,
    next_id: i64,
}

/// In-memory venue store implementation for testing.
///
/// A transaction holds the whole table for its lifetime, which makes every
/// transaction serializable. Writes are staged and only become visible on
/// commit.
#[derive(Clone, Default)]
pub struct InMemoryVenueStore {
    table: Arc<Mutex<Table>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryVenueStore {
    /// Creates a new empty in-memory venue store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`VenueStoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Inserts a row directly, bypassing transactions. Test setup only.
    pub async fn seed(&self, name: &VenueName, status: VenueStatus, deleted: bool) -> Venue {
        let mut table = self.table.lock().await;
        table.next_id += 1;
        let now = Utc::now();
        let venue = Venue {
            id: VenueId::new(table.next_id),
            name: name.clone(),
            sold_out: status.sold_out,
            first_sold_out: status.first_sold_out,
            created_at: now,
            updated_at: None,
            deleted_at: deleted.then_some(now),
        };
        table.rows.insert(name.clone(), venue.clone());
        venue
    }

    /// Returns the number of rows, including soft-deleted ones.
    pub async fn venue_count(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VenueStoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VenueStore for InMemoryVenueStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        self.check_available()?;
        let guard = Arc::clone(&self.table).lock_owned().await;
        Ok(InMemoryTransaction {
            guard,
            staged: HashMap::new(),
            next_id: None,
        })
    }

    async fn find_by_name(&self, name: &VenueName) -> Result<Option<Venue>> {
        self.check_available()?;
        let table = self.table.lock().await;
        Ok(table.rows.get(name).filter(|v| v.is_live()).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Venue>> {
        self.check_available()?;
        let table = self.table.lock().await;
        let mut venues: Vec<_> = table.rows.values().filter(|v| v.is_live()).cloned().collect();
        venues.sort_by_key(|v| v.id);
        Ok(venues)
    }
}

/// Transaction over an [`InMemoryVenueStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Table>,
    staged: HashMap<VenueName, Venue>,
    next_id: Option<i64>,
}

impl InMemoryTransaction {
    fn get(&self, name: &VenueName) -> Option<&Venue> {
        self.staged.get(name).or_else(|| self.guard.rows.get(name))
    }

    /// Every row as this transaction sees it.
    fn visible(&self) -> impl Iterator<Item = &Venue> {
        let committed = self
            .guard
            .rows
            .values()
            .filter(|v| !self.staged.contains_key(&v.name));
        committed.chain(self.staged.values())
    }

    fn check_single_holder(&self, venue: &Venue) -> Result<()> {
        if !venue.first_sold_out || !venue.is_live() {
            return Ok(());
        }
        let other = self
            .visible()
            .any(|v| v.name != venue.name && v.first_sold_out && v.is_live());
        if other {
            return Err(VenueStoreError::FirstSoldOutConflict {
                venue: venue.name.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VenueTransaction for InMemoryTransaction {
    async fn lock_first_sold_out(&mut self) -> Result<()> {
        // The table guard already excludes every other transaction.
        Ok(())
    }

    async fn find_for_update(&mut self, name: &VenueName) -> Result<Option<Venue>> {
        Ok(self.get(name).cloned())
    }

    async fn first_sold_out_holder(
        &mut self,
        excluding: &VenueName,
    ) -> Result<Option<VenueName>> {
        Ok(self
            .visible()
            .find(|v| &v.name != excluding && v.first_sold_out && v.is_live())
            .map(|v| v.name.clone()))
    }

    async fn release_first_sold_out(&mut self, keep: &VenueName) -> Result<u64> {
        let now = Utc::now();
        let released: Vec<Venue> = self
            .visible()
            .filter(|v| &v.name != keep && v.first_sold_out)
            .map(|v| Venue {
                first_sold_out: false,
                updated_at: Some(now),
                ..v.clone()
            })
            .collect();

        let count = released.len() as u64;
        for venue in released {
            self.staged.insert(venue.name.clone(), venue);
        }
        Ok(count)
    }

    async fn insert(&mut self, name: &VenueName, status: VenueStatus) -> Result<Venue> {
        if self.get(name).is_some() {
            return Err(VenueStoreError::InvalidRow(format!(
                "venue {name} already exists"
            )));
        }

        let id = self.next_id.unwrap_or(self.guard.next_id) + 1;
        let venue = Venue {
            id: VenueId::new(id),
            name: name.clone(),
            sold_out: status.sold_out,
            first_sold_out: status.first_sold_out,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        };
        self.check_single_holder(&venue)?;

        self.next_id = Some(id);
        self.staged.insert(name.clone(), venue.clone());
        Ok(venue)
    }

    async fn update(&mut self, existing: &Venue, status: VenueStatus) -> Result<Venue> {
        let current = self
            .visible()
            .find(|v| v.id == existing.id)
            .cloned()
            .ok_or_else(|| {
                VenueStoreError::InvalidRow(format!("no venue with id {}", existing.id))
            })?;

        let venue = Venue {
            sold_out: status.sold_out,
            first_sold_out: status.first_sold_out,
            updated_at: Some(Utc::now()),
            deleted_at: None,
            ..current
        };
        self.check_single_holder(&venue)?;

        self.staged.insert(venue.name.clone(), venue.clone());
        Ok(venue)
    }

    async fn commit(mut self) -> Result<()> {
        if let Some(next_id) = self.next_id {
            self.guard.next_id = next_id;
        }
        let staged = std::mem::take(&mut self.staged);
        self.guard.rows.extend(staged);
        Ok(())
    }
}
