//! NATS message queue implementation

use crate::messaging::config::NatsConfig;
use crate::messaging::error::{MessagingError, MessagingResult};
use crate::messaging::traits::{Message, MessageConsumer, MessageProducer, MessageStream};
use async_nats::{Client, ServerAddr};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// NATS connection used for both publishing and subscribing
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to the configured servers
    pub async fn connect(config: &NatsConfig) -> MessagingResult<Self> {
        let servers = server_addrs(&config.servers)?;

        let delay = Duration::from_millis(config.reconnect_delay_ms);
        let client = async_nats::ConnectOptions::new()
            .name(&config.connection_name)
            .reconnect_delay_callback(move |_attempts| delay)
            .connect(servers)
            .await
            .map_err(|e| {
                MessagingError::ConnectionFailed(format!("NATS connection failed: {}", e))
            })?;

        tracing::info!(servers = ?config.servers, "Connected to NATS");
        Ok(Self { client })
    }
}

fn server_addrs(servers: &[String]) -> MessagingResult<Vec<ServerAddr>> {
    if servers.is_empty() {
        return Err(MessagingError::ConfigurationError(
            "no NATS servers configured".to_string(),
        ));
    }

    servers
        .iter()
        .map(|server| {
            server.parse::<ServerAddr>().map_err(|e| {
                MessagingError::ConfigurationError(format!("invalid NATS server {}: {}", server, e))
            })
        })
        .collect()
}

#[async_trait]
impl MessageProducer for NatsClient {
    async fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> MessagingResult<()> {
        self.client
            .publish(topic.to_string(), payload.into())
            .await
            .map_err(|e| MessagingError::PublishFailed(format!("NATS publish failed: {}", e)))?;

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        matches!(
            self.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }

    async fn close(&self) -> MessagingResult<()> {
        self.client
            .flush()
            .await
            .map_err(|e| MessagingError::PublishFailed(format!("NATS flush failed: {}", e)))
    }
}

#[async_trait]
impl MessageConsumer for NatsClient {
    async fn subscribe(&self, topic: &str) -> MessagingResult<Box<dyn MessageStream>> {
        let subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| MessagingError::SubscribeFailed(format!("NATS subscribe failed: {}", e)))?;

        Ok(Box::new(NatsMessageStream { subscriber }))
    }
}

/// NATS message stream
pub struct NatsMessageStream {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl MessageStream for NatsMessageStream {
    async fn next(&mut self) -> Option<Message> {
        self.subscriber.next().await.map(|msg| Message {
            topic: msg.subject.to_string(),
            payload: msg.payload.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nats_config() {
        let config = NatsConfig::default();
        assert!(!config.servers.is_empty());
        assert_eq!(config.connection_name, "gas-leak-monitor");
    }

    #[test]
    fn test_every_server_is_used() {
        let servers = vec![
            "nats://nats-a:4222".to_string(),
            "nats://nats-b:4222".to_string(),
        ];
        let addrs = server_addrs(&servers).unwrap();
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[1].host(), "nats-b");
    }

    #[test]
    fn test_invalid_server_is_rejected() {
        let servers = vec!["nats://ok:4222".to_string(), "http://[bad".to_string()];
        assert!(matches!(
            server_addrs(&servers),
            Err(MessagingError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_requires_server() {
        let config = NatsConfig {
            servers: vec![],
            ..Default::default()
        };
        assert!(matches!(
            NatsClient::connect(&config).await,
            Err(MessagingError::ConfigurationError(_))
        ));
    }
}
