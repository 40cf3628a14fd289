//! Ticket discount policy backed by a decision table.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PolicyError, Result};
use crate::table::DecisionTable;

/// Input names the policy passes to the table.
pub const INPUT_PRICE: &str = "price";
pub const INPUT_REGION: &str = "region";
pub const INPUT_SOLD_OUT: &str = "is_ticket_sold_out";

/// Outcome of evaluating the policy for one ticket tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountDecision {
    pub discount_amount: i64,
    pub discounted_price: i64,
}

/// Discount policy loaded once and shared read-only between callers.
#[derive(Debug, Clone)]
pub struct DiscountPolicy {
    table: DecisionTable,
}

impl DiscountPolicy {
    /// Reads and validates the decision table at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let policy = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            table = %policy.name(),
            rules = policy.table.rules.len(),
            "Discount policy loaded"
        );
        Ok(policy)
    }

    /// Parses and validates a decision table from JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        let table: DecisionTable = serde_json::from_str(raw)?;
        Self::from_table(table)
    }

    pub fn from_table(table: DecisionTable) -> Result<Self> {
        table.validate()?;
        Ok(Self { table })
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Evaluates the policy for a ticket price in a region.
    pub fn evaluate(&self, price: i64, region: &str, is_sold_out: bool) -> Result<DiscountDecision> {
        let mut input = Map::new();
        input.insert(INPUT_PRICE.to_string(), Value::from(price));
        input.insert(INPUT_REGION.to_string(), Value::from(region));
        input.insert(INPUT_SOLD_OUT.to_string(), Value::from(is_sold_out));

        let result = self.table.evaluate(&input).and_then(|output| {
            serde_json::from_value::<DiscountDecision>(Value::Object(output))
                .map_err(|e| PolicyError::Output(e.to_string()))
        });

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!("policy_evaluations_total", "outcome" => outcome).increment(1);

        if let Err(e) = &result {
            tracing::warn!(table = %self.name(), price, region, error = %e, "Policy evaluation failed");
        }
        result
    }
}
