//! Publisher/subscriber traits and the in-memory broker.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_core::Stream;
use tokio::sync::{Mutex, mpsc};

use crate::error::{MessagingError, Result};
use crate::message::Message;

/// Stream of messages for one subscription.
///
/// A message yielded by the stream has left the broker: it is acknowledged
/// on dequeue and will not be redelivered.
pub type MessageStream = Pin<Box<dyn Stream<Item = Message> + Send>>;

/// Publishes messages to topics.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, message: Message) -> Result<()>;
}

/// Subscribes to topics.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Returns a stream of every message published to `topic` from now on.
    async fn subscribe(&self, topic: &str) -> Result<MessageStream>;
}

#[derive(Debug, Default)]
struct TopicState {
    subscribers: Vec<mpsc::UnboundedSender<Message>>,
    log: Vec<Message>,
}

/// In-process broker. Each subscriber receives its own copy of every
/// message published after it subscribed.
///
/// A broker built with [`InMemoryBroker::with_log`] also keeps every
/// published message in a per-topic log for inspection; the default broker
/// retains nothing once a message is handed to its subscribers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
    closed: Arc<AtomicBool>,
    keep_log: bool,
}

impl InMemoryBroker {
    /// Creates a new in-memory broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker that records every published message.
    pub fn with_log() -> Self {
        Self {
            keep_log: true,
            ..Self::default()
        }
    }

    /// Returns every message published to `topic`, oldest first.
    ///
    /// Always empty unless the broker was built with [`InMemoryBroker::with_log`].
    pub async fn published(&self, topic: &str) -> Vec<Message> {
        self.topics
            .lock()
            .await
            .get(topic)
            .map(|t| t.log.clone())
            .unwrap_or_default()
    }

    /// Closes the broker. Open subscription streams end once drained.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for topic in self.topics.lock().await.values_mut() {
            topic.subscribers.clear();
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MessagingError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish(&self, topic: &str, message: Message) -> Result<()> {
        self.check_open()?;

        let mut topics = self.topics.lock().await;
        let state = topics.entry(topic.to_string()).or_default();
        state.subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        if self.keep_log {
            state.log.push(message);
        }

        metrics::counter!("messages_published_total", "topic" => topic.to_string()).increment(1);
        Ok(())
    }
}

#[async_trait]
impl Subscriber for InMemoryBroker {
    async fn subscribe(&self, topic: &str) -> Result<MessageStream> {
        self.check_open()?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.topics
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .subscribers
            .push(tx);

        tracing::debug!(topic, "Subscribed to topic");
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        });
        Ok(Box::pin(stream))
    }
}
