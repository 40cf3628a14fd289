pub mod error;
pub mod policy;
pub mod table;

pub use error::{PolicyError, Result};
pub use policy::{DiscountDecision, DiscountPolicy};
pub use table::{Condition, DecisionTable, Expr, HitPolicy, Op, Rule};
