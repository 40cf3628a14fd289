//! Decision table model and evaluation.
//!
//! A table is an ordered list of rules. Each rule has a `when` block mapping
//! input names to conditions and a `then` block mapping output names to
//! expressions. A rule matches when every one of its conditions holds.
//!
//! ```json
//! {
//!   "name": "ticket-discounted",
//!   "hit_policy": "first",
//!   "inputs": ["price", "region", "is_ticket_sold_out"],
//!   "rules": [
//!     {
//!       "id": "sold-out",
//!       "when": { "is_ticket_sold_out": { "eq": true } },
//!       "then": { "discount_amount": 0, "discounted_price": "$price" }
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

use crate::error::{PolicyError, Result};

/// How matching rules are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitPolicy {
    /// The first matching rule in table order wins.
    #[default]
    First,
    /// Exactly one rule may match.
    Unique,
}

/// A parsed decision table.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTable {
    pub name: String,
    #[serde(default)]
    pub hit_policy: HitPolicy,
    /// Declared input names. When non-empty, conditions and `$` references
    /// must name one of these.
    #[serde(default)]
    pub inputs: Vec<String>,
    pub rules: Vec<Rule>,
}

/// A single row of the table.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub when: BTreeMap<String, Condition>,
    pub then: BTreeMap<String, Expr>,
}

/// Test applied to one input value.
///
/// Written as a single-key object such as `{"gte": 100000}`, or the bare
/// string `"any"`. A missing input never satisfies a condition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Lt(f64),
    Lte(f64),
    Gt(f64),
    Gte(f64),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// Inclusive range `[low, high]`.
    Between(f64, f64),
    Any,
}

/// Arithmetic operation usable in a `then` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Round,
}

/// Output expression.
///
/// - `"$name"` reads an input,
/// - `{"op": [args...]}` applies an operation (`{"round": expr}` takes one),
/// - anything else is a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Input(String),
    Apply(Op, Vec<Expr>),
}

impl DecisionTable {
    /// Checks the table for structural problems that parsing cannot catch.
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(PolicyError::Invalid(format!(
                "table '{}' has no rules",
                self.name
            )));
        }

        for (index, rule) in self.rules.iter().enumerate() {
            let label = rule.label(index);
            let invalid = |message: String| PolicyError::Invalid(format!("rule '{label}': {message}"));

            if rule.then.is_empty() {
                return Err(invalid("no outputs".to_string()));
            }

            for (input, condition) in &rule.when {
                self.check_input(input).map_err(invalid)?;
                if let Condition::Between(low, high) = condition
                    && low > high
                {
                    return Err(invalid(format!("empty range [{low}, {high}] for '{input}'")));
                }
            }

            for (output, expr) in &rule.then {
                expr.validate(&|name| self.check_input(name))
                    .map_err(|message| invalid(format!("output '{output}': {message}")))?;
            }
        }

        Ok(())
    }

    /// Evaluates the table against a flat input map and returns the outputs
    /// of the selected rule.
    pub fn evaluate(&self, input: &Map<String, Value>) -> Result<Map<String, Value>> {
        let mut matching = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.matches(input));

        let (index, rule) = matching
            .next()
            .ok_or_else(|| PolicyError::NoMatchingRule {
                table: self.name.clone(),
            })?;

        if self.hit_policy == HitPolicy::Unique {
            let others: Vec<String> = matching.map(|(i, r)| r.label(i)).collect();
            if !others.is_empty() {
                let mut rules = vec![rule.label(index)];
                rules.extend(others);
                return Err(PolicyError::AmbiguousMatch {
                    table: self.name.clone(),
                    rules,
                });
            }
        }

        let label = rule.label(index);
        tracing::debug!(table = %self.name, rule = %label, "decision rule matched");

        rule.then
            .iter()
            .map(|(output, expr)| {
                expr.eval(input)
                    .map(|value| (output.clone(), value))
                    .map_err(|message| PolicyError::Evaluation {
                        rule: label.clone(),
                        message,
                    })
            })
            .collect()
    }

    fn check_input(&self, name: &str) -> std::result::Result<(), String> {
        if self.inputs.is_empty() || self.inputs.iter().any(|i| i == name) {
            Ok(())
        } else {
            Err(format!("unknown input '{name}'"))
        }
    }
}

impl Rule {
    /// Returns the rule id, or its position when it has none.
    pub fn label(&self, index: usize) -> String {
        self.id.clone().unwrap_or_else(|| format!("#{index}"))
    }

    fn matches(&self, input: &Map<String, Value>) -> bool {
        self.when
            .iter()
            .all(|(name, condition)| condition.matches(input.get(name)))
    }
}

impl Condition {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        let number = value.as_f64();

        match self {
            Self::Eq(expected) => same_value(value, expected),
            Self::Ne(expected) => !same_value(value, expected),
            Self::Lt(bound) => number.is_some_and(|n| n < *bound),
            Self::Lte(bound) => number.is_some_and(|n| n <= *bound),
            Self::Gt(bound) => number.is_some_and(|n| n > *bound),
            Self::Gte(bound) => number.is_some_and(|n| n >= *bound),
            Self::In(options) => options.iter().any(|o| same_value(value, o)),
            Self::NotIn(options) => !options.iter().any(|o| same_value(value, o)),
            Self::Between(low, high) => number.is_some_and(|n| n >= *low && n <= *high),
            Self::Any => true,
        }
    }
}

/// Numbers compare by value so `1` and `1.0` are equal.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

impl Op {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "add" => Self::Add,
            "sub" => Self::Sub,
            "mul" => Self::Mul,
            "div" => Self::Div,
            "min" => Self::Min,
            "max" => Self::Max,
            "round" => Self::Round,
            _ => return None,
        })
    }

    fn apply(self, values: &[f64]) -> std::result::Result<f64, String> {
        let (first, rest) = values
            .split_first()
            .ok_or_else(|| "operation has no arguments".to_string())?;

        match self {
            Self::Add => Ok(values.iter().sum()),
            Self::Mul => Ok(values.iter().product()),
            Self::Sub => Ok(rest.iter().fold(*first, |acc, x| acc - x)),
            Self::Div => rest.iter().try_fold(*first, |acc, x| {
                if *x == 0.0 {
                    Err("division by zero".to_string())
                } else {
                    Ok(acc / x)
                }
            }),
            Self::Min => Ok(rest.iter().copied().fold(*first, f64::min)),
            Self::Max => Ok(rest.iter().copied().fold(*first, f64::max)),
            Self::Round => Ok(first.round()),
        }
    }
}

impl Expr {
    fn validate(
        &self,
        check_input: &dyn Fn(&str) -> std::result::Result<(), String>,
    ) -> std::result::Result<(), String> {
        match self {
            Self::Literal(_) => Ok(()),
            Self::Input(name) => check_input(name),
            Self::Apply(op, args) => {
                match (op, args.len()) {
                    (_, 0) => return Err(format!("{op:?} needs at least one argument")),
                    (Op::Round, n) if n > 1 => {
                        return Err(format!("Round takes one argument, got {n}"));
                    }
                    _ => {}
                }
                args.iter().try_for_each(|arg| arg.validate(check_input))
            }
        }
    }

    fn eval(&self, input: &Map<String, Value>) -> std::result::Result<Value, String> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Input(name) => input
                .get(name)
                .cloned()
                .ok_or_else(|| format!("input '{name}' is missing")),
            Self::Apply(op, args) => {
                let values = args
                    .iter()
                    .map(|arg| {
                        let value = arg.eval(input)?;
                        value
                            .as_f64()
                            .ok_or_else(|| format!("{op:?} expects numbers, got {value}"))
                    })
                    .collect::<std::result::Result<Vec<f64>, String>>()?;
                number_value(op.apply(&values)?)
            }
        }
    }
}

/// Integral results are emitted as integers.
fn number_value(n: f64) -> std::result::Result<Value, String> {
    if !n.is_finite() {
        return Err(format!("result {n} is not finite"));
    }
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Ok(Value::from(n as i64));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| format!("result {n} is not representable"))
}

impl TryFrom<Value> for Expr {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::String(s) => {
                if let Some(name) = s.strip_prefix('$') {
                    return Ok(Self::Input(name.to_string()));
                }
                Ok(Self::Literal(Value::String(s)))
            }
            Value::Object(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "operation object must have exactly one key, got {}",
                        map.len()
                    ));
                }
                let Some((name, arg)) = map.into_iter().next() else {
                    return Err("empty operation object".to_string());
                };
                let op = Op::parse(&name).ok_or_else(|| format!("unknown operation '{name}'"))?;
                let args = match arg {
                    Value::Array(items) => items
                        .into_iter()
                        .map(Expr::try_from)
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                    other => vec![Expr::try_from(other)?],
                };
                Ok(Self::Apply(op, args))
            }
            other => Ok(Self::Literal(other)),
        }
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Expr::try_from(value).map_err(serde::de::Error::custom)
    }
}
