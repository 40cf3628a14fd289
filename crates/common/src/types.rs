use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Returned when a venue name is empty or only whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("venue name must not be empty")]
pub struct InvalidVenueName;

/// Name of a venue (also used as the region name by the catalog).
///
/// Names are case-sensitive and stored exactly as given. The only
/// constraint is that they are not blank, so an invalid name is rejected
/// before it ever reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VenueName(String);

impl VenueName {
    /// Validates and wraps a venue name.
    pub fn parse(name: impl Into<String>) -> Result<Self, InvalidVenueName> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(InvalidVenueName);
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VenueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VenueName {
    type Error = InvalidVenueName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for VenueName {
    type Error = InvalidVenueName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<VenueName> for String {
    fn from(name: VenueName) -> Self {
        name.0
    }
}

impl AsRef<str> for VenueName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier that follows a message through retries and into the poison queue.
///
/// Wraps a UUID so correlation ids cannot be confused with message ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Creates a new random correlation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a correlation ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a correlation ID from its hyphenated string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
