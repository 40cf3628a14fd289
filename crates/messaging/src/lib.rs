//! Message delivery for status-change consumers.
//!
//! This crate provides:
//! - the [`Message`] envelope and the [`Publisher`]/[`Subscriber`] traits
//! - an in-memory broker and a RabbitMQ broker
//! - a router that runs one worker per subscribed topic, assigns
//!   correlation ids, retries failed handlers and routes exhausted
//!   messages to `<topic>_poisoned`

pub mod amqp;
pub mod broker;
pub mod error;
pub mod message;
pub mod poison;
pub mod retry;
pub mod router;

pub use amqp::{AmqpBroker, DEFAULT_PREFETCH};
pub use broker::{InMemoryBroker, MessageStream, Publisher, Subscriber};
pub use error::{FailureKind, HandlerError, HandlerResult, MessagingError, Result};
pub use message::{CORRELATION_ID_KEY, Message};
pub use poison::{POISON_SUFFIX, PoisonedMessage, poison_topic};
pub use retry::{RetryExhausted, RetryPolicy};
pub use router::{FnHandler, MessageHandler, MessageRouter, RouterConfig, RouterHandle, handler_fn};
