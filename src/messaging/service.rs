//! Main messaging service

use crate::messaging::config::{MessagingBackend, MessagingConfig};
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::memory::InMemoryBus;
use crate::messaging::nats::NatsClient;
use crate::messaging::traits::{MessageConsumer, MessageProducer, MessageStream};
use crate::metrics::{MESSAGES_PUBLISHED_TOTAL, PUBLISH_FAILURES_TOTAL};
use serde::Serialize;
use std::sync::Arc;

/// Unified access to the configured message bus.
///
/// Topic arguments are short names (`data`, `predict`, ...); the configured
/// prefix is added here.
pub struct MessagingService {
    config: MessagingConfig,
    producer: Option<Arc<dyn MessageProducer>>,
    consumer: Option<Arc<dyn MessageConsumer>>,
}

impl MessagingService {
    /// Connect to the configured backend
    pub async fn new(config: MessagingConfig) -> MessagingResult<Self> {
        if !config.enabled {
            tracing::info!("Messaging disabled");
            return Ok(Self {
                config,
                producer: None,
                consumer: None,
            });
        }

        let (producer, consumer): (Arc<dyn MessageProducer>, Arc<dyn MessageConsumer>) =
            match config.backend {
                MessagingBackend::Nats => {
                    let client = NatsClient::connect(&config.nats).await?;
                    (Arc::new(client.clone()), Arc::new(client))
                }
                MessagingBackend::InMemory => {
                    let bus = InMemoryBus::new();
                    (Arc::new(bus.clone()), Arc::new(bus))
                }
            };

        tracing::info!(backend = ?config.backend, prefix = %config.topic_prefix, "Messaging ready");

        Ok(Self {
            config,
            producer: Some(producer),
            consumer: Some(consumer),
        })
    }

    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    pub fn full_topic(&self, topic: &str) -> String {
        self.config.full_topic(topic)
    }

    /// Publish a message as JSON
    pub async fn publish<T: Serialize + Send + Sync>(
        &self,
        topic: &str,
        message: &T,
    ) -> MessagingResult<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish_bytes(topic, payload).await
    }

    /// Publish a raw payload
    pub async fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> MessagingResult<()> {
        let Some(producer) = self.producer.as_ref() else {
            return Ok(());
        };

        let full_topic = self.full_topic(topic);
        let backend_name = format!("{:?}", self.config.backend);
        let result = producer.publish_bytes(&full_topic, payload).await;

        if result.is_ok() {
            MESSAGES_PUBLISHED_TOTAL
                .with_label_values(&[&full_topic, &backend_name])
                .inc();
        } else {
            PUBLISH_FAILURES_TOTAL
                .with_label_values(&[&full_topic, &backend_name])
                .inc();
        }

        result
    }

    /// Subscribe to a topic and receive messages
    pub async fn subscribe(&self, topic: &str) -> MessagingResult<Box<dyn MessageStream>> {
        let consumer = self
            .consumer
            .as_ref()
            .ok_or_else(|| MessagingError::BackendUnavailable("Messaging disabled".to_string()))?;

        consumer.subscribe(&self.full_topic(topic)).await
    }

    /// Check if the service is connected
    pub async fn is_connected(&self) -> bool {
        match self.producer.as_ref() {
            Some(producer) => producer.is_connected().await,
            None => false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.producer.is_some()
    }

    /// Close all connections
    pub async fn close(&self) -> MessagingResult<()> {
        if let Some(producer) = self.producer.as_ref() {
            producer.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::config::DATA_TOPIC;

    #[tokio::test]
    async fn test_disabled_service() {
        let config = MessagingConfig {
            enabled: false,
            ..Default::default()
        };

        let service = MessagingService::new(config).await.unwrap();
        assert!(!service.is_enabled());
        assert!(!service.is_connected().await);
        assert!(service.publish(DATA_TOPIC, &"ignored").await.is_ok());
        assert!(matches!(
            service.subscribe(DATA_TOPIC).await,
            Err(MessagingError::BackendUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_round_trip_uses_prefix() {
        let service = MessagingService::new(MessagingConfig::in_memory())
            .await
            .unwrap();
        let mut stream = service.subscribe(DATA_TOPIC).await.unwrap();

        service
            .publish(DATA_TOPIC, &serde_json::json!({"worker_1_mean": 1.0}))
            .await
            .unwrap();

        let message = stream.next().await.unwrap();
        assert_eq!(message.topic, "sensors.data");
        let value: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(value["worker_1_mean"], 1.0);
    }
}
