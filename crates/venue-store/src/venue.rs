use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::VenueName;

/// Database identifier of a venue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(i64);

impl VenueId {
    /// Wraps a raw row id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw row id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two status flags tracked for every venue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueStatus {
    pub sold_out: bool,
    pub first_sold_out: bool,
}

impl VenueStatus {
    pub fn new(sold_out: bool, first_sold_out: bool) -> Self {
        Self {
            sold_out,
            first_sold_out,
        }
    }
}

/// A venue row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: VenueName,
    pub sold_out: bool,
    pub first_sold_out: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Soft-delete marker. Deleted venues are invisible to reads.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Venue {
    /// Returns the current status flags.
    pub fn status(&self) -> VenueStatus {
        VenueStatus::new(self.sold_out, self.first_sold_out)
    }

    /// Returns true unless the venue has been soft-deleted.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}
