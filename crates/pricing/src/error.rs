//! Policy error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or evaluating a decision table.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The policy file is not a well-formed decision table.
    #[error("Failed to parse decision table: {0}")]
    Parse(#[from] serde_json::Error),

    /// The table parsed but is not usable.
    #[error("Invalid decision table: {0}")]
    Invalid(String),

    /// No rule matched the input.
    #[error("No rule in table '{table}' matched the input")]
    NoMatchingRule { table: String },

    /// More than one rule matched under the `unique` hit policy.
    #[error("Rules {rules:?} in table '{table}' all matched the input")]
    AmbiguousMatch { table: String, rules: Vec<String> },

    /// An output expression could not be computed.
    #[error("Failed to evaluate rule '{rule}': {message}")]
    Evaluation { rule: String, message: String },

    /// The table output does not have the expected shape.
    #[error("Decision output has unexpected shape: {0}")]
    Output(String),
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
