//! Poison topic records.

use common::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::FailureKind;
use crate::message::Message;
use crate::retry::RetryExhausted;

/// Suffix appended to a topic name to form its poison topic.
pub const POISON_SUFFIX: &str = "_poisoned";

/// Returns the poison topic for `topic`.
pub fn poison_topic(topic: &str) -> String {
    format!("{topic}{POISON_SUFFIX}")
}

/// Record published when a message could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoisonedMessage {
    /// Topic the message was consumed from.
    pub topic_target: String,
    pub error_msg: String,
    /// Original payload; JSON payloads are embedded as-is, anything else as a string.
    pub payload: Value,
    pub correlation_id: CorrelationId,
    pub message_uuid: Uuid,
    pub attempts: usize,
    pub failure_kind: FailureKind,
}

impl PoisonedMessage {
    pub fn new(
        topic: &str,
        message: &Message,
        correlation_id: CorrelationId,
        failure: &RetryExhausted,
    ) -> Self {
        let payload = serde_json::from_slice(&message.payload).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&message.payload).into_owned())
        });

        Self {
            topic_target: topic.to_string(),
            error_msg: failure.error.to_string(),
            payload,
            correlation_id,
            message_uuid: message.uuid,
            attempts: failure.attempts,
            failure_kind: failure.error.kind(),
        }
    }

    /// Wraps the record in a message that keeps the original metadata.
    pub fn to_message(&self, original: &Message) -> serde_json::Result<Message> {
        let mut message = Message::json(self)?.with_correlation_id(self.correlation_id);
        for (key, value) in &original.metadata {
            message.metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }
        message
            .metadata
            .insert("poisoned_topic".to_string(), self.topic_target.clone());
        message
            .metadata
            .insert("reason_poisoned".to_string(), self.error_msg.clone());
        Ok(message)
    }
}
