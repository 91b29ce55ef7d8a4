use crate::error::AppError;
use crate::messaging::{Message, MessageStream, MessagingError, MessagingService};
use crate::metrics::{INGEST_MALFORMED_TOTAL, MESSAGES_CONSUMED_TOTAL};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Why a handler could not process a message
#[derive(Error, Debug)]
pub enum IngestError {
    /// Payload could not be decoded; the message is dropped
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Malformed(err.to_string())
    }
}

/// Processes messages from one topic
#[async_trait]
pub trait TopicHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<(), IngestError>;
}

/// Dispatches bus messages to handlers keyed by short topic name
#[derive(Clone, Default)]
pub struct MessageRouter {
    handlers: HashMap<String, Arc<dyn TopicHandler>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, topic: &str, handler: Arc<dyn TopicHandler>) -> Self {
        self.handlers.insert(topic.to_string(), handler);
        self
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Handle one message. Failures are logged and counted, never returned.
    pub async fn dispatch(&self, topic: &str, message: &Message) {
        MESSAGES_CONSUMED_TOTAL
            .with_label_values(&[&message.topic])
            .inc();

        let Some(handler) = self.handlers.get(topic) else {
            tracing::warn!(topic = %message.topic, "No handler for topic, message dropped");
            return;
        };

        match handler.handle(&message.payload).await {
            Ok(()) => {}
            Err(IngestError::Malformed(reason)) => {
                INGEST_MALFORMED_TOTAL
                    .with_label_values(&[&message.topic])
                    .inc();
                tracing::warn!(
                    topic = %message.topic,
                    bytes = message.payload.len(),
                    reason = %reason,
                    "Dropping malformed message"
                );
            }
            Err(e) => {
                tracing::error!(topic = %message.topic, error = %e, "Failed to handle message");
            }
        }
    }

    /// Subscribe every routed topic and process messages until the streams end
    pub async fn start(self, messaging: &MessagingService) -> Result<RouterHandle, MessagingError> {
        let router = Arc::new(self);
        let mut tasks = Vec::new();

        for topic in router.topics() {
            let stream = messaging.subscribe(topic).await?;
            tracing::info!(topic = %messaging.full_topic(topic), "Subscribed");
            tasks.push(tokio::spawn(consume(
                router.clone(),
                topic.to_string(),
                stream,
            )));
        }

        Ok(RouterHandle { tasks })
    }
}

async fn consume(router: Arc<MessageRouter>, topic: String, mut stream: Box<dyn MessageStream>) {
    while let Some(message) = stream.next().await {
        router.dispatch(&topic, &message).await;
    }
    tracing::info!(topic = %topic, "Subscription ended");
}

/// Running subscriptions
pub struct RouterHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl RouterHandle {
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
