//! Process-local message bus on tokio broadcast channels.
//!
//! Topics match exactly. Like NATS core, a message published while nobody
//! is subscribed is dropped.

use crate::messaging::error::MessagingResult;
use crate::messaging::traits::{Message, MessageConsumer, MessageProducer, MessageStream};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone, Default)]
pub struct InMemoryBus {
    channels: Arc<DashMap<String, broadcast::Sender<Message>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Message> {
        self.channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl MessageProducer for InMemoryBus {
    async fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> MessagingResult<()> {
        let message = Message {
            topic: topic.to_string(),
            payload,
        };
        // Err only means there are no subscribers
        if self.sender(topic).send(message).is_err() {
            tracing::trace!(topic = %topic, "No subscribers, message dropped");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn close(&self) -> MessagingResult<()> {
        self.channels.clear();
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for InMemoryBus {
    async fn subscribe(&self, topic: &str) -> MessagingResult<Box<dyn MessageStream>> {
        let receiver = self.sender(topic).subscribe();
        Ok(Box::new(InMemoryStream {
            inner: BroadcastStream::new(receiver),
        }))
    }
}

pub struct InMemoryStream {
    inner: BroadcastStream<Message>,
}

#[async_trait]
impl MessageStream for InMemoryStream {
    async fn next(&mut self) -> Option<Message> {
        loop {
            match self.inner.next().await? {
                Ok(message) => return Some(message),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Subscriber lagged, messages skipped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = InMemoryBus::new();
        let mut stream = bus.subscribe("sensors.data").await.unwrap();

        bus.publish_bytes("sensors.data", b"{}".to_vec()).await.unwrap();

        let message = stream.next().await.unwrap();
        assert_eq!(message.topic, "sensors.data");
        assert_eq!(message.payload, b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = InMemoryBus::new();
        let mut data = bus.subscribe("sensors.data").await.unwrap();

        bus.publish_bytes("sensors.train", b"go".to_vec()).await.unwrap();
        bus.publish_bytes("sensors.data", b"reading".to_vec()).await.unwrap();

        assert_eq!(data.next().await.unwrap().payload, b"reading".to_vec());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = InMemoryBus::new();
        assert!(bus.publish_bytes("nobody.listens", vec![1]).await.is_ok());
    }
}
