//! Message envelope.

use std::collections::HashMap;

use common::CorrelationId;
use serde::Serialize;
use uuid::Uuid;

/// Metadata key under which the correlation id travels.
pub const CORRELATION_ID_KEY: &str = "correlation_id";

/// A message as delivered by a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub uuid: Uuid,
    pub correlation_id: Option<CorrelationId>,
    pub payload: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

impl Message {
    /// Creates a message with a fresh uuid and no correlation id.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            correlation_id: None,
            payload: payload.into(),
            metadata: HashMap::new(),
        }
    }

    /// Creates a message carrying `value` encoded as JSON.
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.set_correlation_id(correlation_id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the correlation id, assigning one if the message has none.
    ///
    /// An id carried only in metadata (as set by another producer) is
    /// adopted rather than replaced.
    pub fn ensure_correlation_id(&mut self) -> CorrelationId {
        if let Some(id) = self.correlation_id {
            return id;
        }
        let id = self
            .metadata
            .get(CORRELATION_ID_KEY)
            .and_then(|raw| CorrelationId::parse(raw))
            .unwrap_or_default();
        self.set_correlation_id(id);
        id
    }

    fn set_correlation_id(&mut self, id: CorrelationId) {
        self.correlation_id = Some(id);
        self.metadata
            .insert(CORRELATION_ID_KEY.to_string(), id.to_string());
    }
}
