//! Ticket catalog client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, UpstreamError};

/// A ticket tier on sale in a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTier {
    pub region_name: String,
    pub level: String,
    /// Price in minor currency units.
    pub price: i64,
}

impl TicketTier {
    pub fn new(region_name: impl Into<String>, level: impl Into<String>, price: i64) -> Self {
        Self {
            region_name: region_name.into(),
            level: level.into(),
            price,
        }
    }
}

/// Trait for ticket catalog lookups.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Lists the ticket tiers for a region, in catalog order.
    async fn find_tickets_by_region(&self, region_name: &str) -> Result<Vec<TicketTier>>;
}

/// In-memory catalog client for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogClient {
    tiers: Arc<RwLock<HashMap<String, Vec<TicketTier>>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryCatalogClient {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tier to its region's list.
    pub async fn add_tier(&self, tier: TicketTier) {
        self.tiers
            .write()
            .await
            .entry(tier.region_name.clone())
            .or_default()
            .push(tier);
    }

    /// Makes every subsequent call fail as if the service returned 503.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalogClient {
    async fn find_tickets_by_region(&self, region_name: &str) -> Result<Vec<TicketTier>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status {
                service: "ticket-service",
                status: 503,
            });
        }

        Ok(self
            .tiers
            .read()
            .await
            .get(region_name)
            .cloned()
            .unwrap_or_default())
    }
}
