//! Recommendation assembler orchestrating the lookups for a query.

use std::sync::Arc;
use std::time::Instant;

use common::VenueName;
use pricing::DiscountPolicy;
use upstream::{CatalogClient, ProfileClient};
use venue_store::VenueStore;

use crate::error::{RecommendationError, Result};
use crate::model::{OnlineTicketStatus, Recommendation};

/// Builds recommendations for users and reports venue status.
///
/// The discount policy is optional so the service can start without one;
/// recommendations then fail with [`RecommendationError::PolicyUnavailable`]
/// while venue status queries keep working.
pub struct RecommendationAssembler<S, P, C>
where
    S: VenueStore,
    P: ProfileClient,
    C: CatalogClient,
{
    store: S,
    profiles: P,
    catalog: C,
    policy: Option<Arc<DiscountPolicy>>,
}

impl<S, P, C> RecommendationAssembler<S, P, C>
where
    S: VenueStore,
    P: ProfileClient,
    C: CatalogClient,
{
    /// Creates a new assembler.
    pub fn new(store: S, profiles: P, catalog: C, policy: Option<Arc<DiscountPolicy>>) -> Self {
        Self {
            store,
            profiles,
            catalog,
            policy,
        }
    }

    /// Returns true when a discount policy is loaded.
    pub fn has_policy(&self) -> bool {
        self.policy.is_some()
    }

    /// Returns the discounted offers for a user's region, in catalog order.
    #[tracing::instrument(skip(self))]
    pub async fn get_recommendation(&self, user_id: i64) -> Result<Vec<Recommendation>> {
        metrics::counter!("recommendation_requests_total").increment(1);
        let started = Instant::now();

        let result = self.assemble(user_id).await;

        metrics::histogram!("recommendation_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::counter!("recommendation_failures_total").increment(1);
            tracing::warn!(user_id, error = %e, "Recommendation failed");
        }
        result
    }

    /// Returns the sold-out status for a region's venue.
    ///
    /// A region without a venue row reports both flags as false.
    #[tracing::instrument(skip(self))]
    pub async fn get_online_ticket(&self, region_name: &str) -> Result<OnlineTicketStatus> {
        let name = parse_region(region_name)?;
        self.venue_status(&name).await
    }

    async fn assemble(&self, user_id: i64) -> Result<Vec<Recommendation>> {
        let policy = self
            .policy
            .as_deref()
            .ok_or(RecommendationError::PolicyUnavailable)?;

        let profile = self.profiles.find_user_profile(user_id).await?;
        let region = parse_region(&profile.region)?;
        let status = self.venue_status(&region).await?;
        let tiers = self.catalog.find_tickets_by_region(region.as_str()).await?;

        tracing::debug!(
            %region,
            tiers = tiers.len(),
            sold_out = status.is_sold_out,
            "Evaluating discount policy"
        );

        tiers
            .into_iter()
            .map(|tier| -> Result<Recommendation> {
                let decision = policy.evaluate(tier.price, region.as_str(), status.is_sold_out)?;
                Ok(Recommendation::new(region.as_str(), tier, decision))
            })
            .collect()
    }

    async fn venue_status(&self, name: &VenueName) -> Result<OnlineTicketStatus> {
        let venue = self.store.find_by_name(name).await?;
        Ok(venue
            .as_ref()
            .map(OnlineTicketStatus::from)
            .unwrap_or_default())
    }
}

fn parse_region(region_name: &str) -> Result<VenueName> {
    VenueName::parse(region_name)
        .map_err(|_| RecommendationError::InvalidRegion(region_name.to_string()))
}
