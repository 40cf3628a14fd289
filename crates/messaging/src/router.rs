//! Message router.
//!
//! The router runs one worker task per registered handler. Each worker
//! consumes its topic with a bounded number of in-flight invocations and
//! wraps every invocation in the same middleware chain:
//!
//! 1. correlation id: assigned if the message has none
//! 2. poison: a message that finally fails is published to `<topic>_poisoned`
//! 3. retry: transient failures are retried on a fixed interval
//! 4. recoverer: a panicking handler is reported as a transient failure

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{FutureExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::broker::{Publisher, Subscriber};
use crate::error::{HandlerError, HandlerResult, Result};
use crate::message::Message;
use crate::poison::{PoisonedMessage, poison_topic};
use crate::retry::{RetryExhausted, RetryPolicy};

/// Processes messages from one topic.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: &Message) -> HandlerResult;
}

/// Handler backed by an async closure. See [`handler_fn`].
pub struct FnHandler<F>(F);

/// Wraps an async closure as a [`MessageHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, message: &Message) -> HandlerResult {
        (self.0)(message.clone()).await
    }
}

/// Router settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub retry: RetryPolicy,
    /// In-flight handler invocations per topic.
    pub concurrency: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: 8,
        }
    }
}

struct Route {
    name: String,
    topic: String,
    handler: Arc<dyn MessageHandler>,
}

/// Routes messages from subscribed topics to their handlers.
pub struct MessageRouter<B>
where
    B: Publisher + Subscriber + Clone + 'static,
{
    broker: B,
    config: RouterConfig,
    routes: Vec<Route>,
}

impl<B> MessageRouter<B>
where
    B: Publisher + Subscriber + Clone + 'static,
{
    /// Creates a router with no handlers.
    pub fn new(broker: B, config: RouterConfig) -> Self {
        Self {
            broker,
            config,
            routes: Vec::new(),
        }
    }

    /// Registers `handler` for every message published to `topic`.
    pub fn add_handler(
        &mut self,
        name: impl Into<String>,
        topic: impl Into<String>,
        handler: impl MessageHandler,
    ) -> &mut Self {
        self.routes.push(Route {
            name: name.into(),
            topic: topic.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.routes.len()
    }

    /// Subscribes every handler and starts its worker.
    ///
    /// Subscriptions are in place when this returns, so messages published
    /// afterwards are delivered.
    pub async fn start(self) -> Result<RouterHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(self.routes.len());

        for route in self.routes {
            let stream = self.broker.subscribe(&route.topic).await?;
            let worker = Worker {
                name: route.name,
                poison_topic: poison_topic(&route.topic),
                topic: route.topic,
                handler: route.handler,
                publisher: self.broker.clone(),
                retry: self.config.retry.clone(),
            };
            let concurrency = self.config.concurrency.max(1);
            let stop = wait_for_shutdown(shutdown_rx.clone());

            tracing::info!(handler = %worker.name, topic = %worker.topic, concurrency, "Starting message handler");
            tasks.push(tokio::spawn(async move {
                stream
                    .take_until(stop)
                    .for_each_concurrent(concurrency, |message| worker.process(message))
                    .await;
                tracing::info!(handler = %worker.name, "Message handler stopped");
            }));
        }

        Ok(RouterHandle {
            shutdown: shutdown_tx,
            tasks,
        })
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Handle to a running router.
pub struct RouterHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RouterHandle {
    /// Stops taking new messages and waits for in-flight ones to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        self.join().await;
    }

    /// Waits until every subscription stream has ended.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Message handler task failed");
            }
        }
    }
}

struct Worker<P: Publisher> {
    name: String,
    topic: String,
    poison_topic: String,
    handler: Arc<dyn MessageHandler>,
    publisher: P,
    retry: RetryPolicy,
}

impl<P: Publisher> Worker<P> {
    async fn process(&self, mut message: Message) {
        let correlation_id = message.ensure_correlation_id();
        let span = tracing::info_span!(
            "handle_message",
            handler = %self.name,
            topic = %self.topic,
            message_uuid = %message.uuid,
            %correlation_id
        );

        async {
            match self.retry.run(|| self.invoke(&message)).await {
                Ok(attempts) => {
                    metrics::counter!("messages_processed_total", "topic" => self.topic.clone(), "outcome" => "ok")
                        .increment(1);
                    tracing::debug!(attempts, "Message processed");
                }
                Err(failure) => self.poison(&message, failure).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn invoke(&self, message: &Message) -> HandlerResult {
        match AssertUnwindSafe(self.handler.handle(message))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(%reason, "Message handler panicked");
                Err(HandlerError::transient(format!("handler panicked: {reason}")))
            }
        }
    }

    async fn poison(&self, message: &Message, failure: RetryExhausted) {
        metrics::counter!("messages_processed_total", "topic" => self.topic.clone(), "outcome" => "poisoned")
            .increment(1);
        tracing::error!(
            attempts = failure.attempts,
            kind = ?failure.error.kind(),
            error = %failure.error,
            poison_topic = %self.poison_topic,
            "Message failed, routing to poison topic"
        );

        let correlation_id = message.correlation_id.unwrap_or_default();
        let record = PoisonedMessage::new(&self.topic, message, correlation_id, &failure);
        let published = match record.to_message(message) {
            Ok(poisoned) => self.publisher.publish(&self.poison_topic, poisoned).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = published {
            tracing::error!(error = %e, "Failed to publish to poison topic, message dropped");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
