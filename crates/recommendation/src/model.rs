//! Recommendation response types.

use pricing::DiscountDecision;
use serde::{Deserialize, Serialize};
use upstream::TicketTier;
use venue_store::Venue;

/// A discounted offer for one ticket tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub region_name: String,
    pub level: String,
    pub discount_price: i64,
    pub original_price: i64,
    pub discount_percentage: f64,
}

impl Recommendation {
    /// Builds an offer for the caller's region. The catalog's own region
    /// label on the tier is not echoed back.
    pub fn new(region_name: &str, tier: TicketTier, decision: DiscountDecision) -> Self {
        Self {
            discount_percentage: discount_percentage(decision.discount_amount, tier.price),
            region_name: region_name.to_string(),
            level: tier.level,
            discount_price: decision.discounted_price,
            original_price: tier.price,
        }
    }
}

/// Sold-out status of a venue as seen by ticket buyers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineTicketStatus {
    pub is_sold_out: bool,
    pub is_first_sold_out: bool,
}

impl From<&Venue> for OnlineTicketStatus {
    fn from(venue: &Venue) -> Self {
        Self {
            is_sold_out: venue.sold_out,
            is_first_sold_out: venue.first_sold_out,
        }
    }
}

/// Discount as a percentage of the original price.
///
/// A free ticket has no meaningful percentage and reports `0.0`, as does
/// any other input that would not produce a finite number.
pub fn discount_percentage(discount_amount: i64, original_price: i64) -> f64 {
    if original_price == 0 {
        return 0.0;
    }
    let percentage = discount_amount as f64 / original_price as f64 * 100.0;
    if percentage.is_finite() { percentage } else { 0.0 }
}
