//! Messaging configuration

use serde::{Deserialize, Serialize};

/// Readings to persist
pub const DATA_TOPIC: &str = "data";

/// Readings to score
pub const PREDICT_TOPIC: &str = "predict";

/// Published prediction results
pub const PREDICTION_TOPIC: &str = "prediction";

/// Training triggers
pub const TRAIN_TOPIC: &str = "train";

/// Messaging backend type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessagingBackend {
    /// NATS server
    #[default]
    Nats,
    /// Process-local broadcast bus (development and tests)
    InMemory,
}

/// NATS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URLs; the client picks among them and fails over
    pub servers: Vec<String>,

    /// Connection name
    pub connection_name: String,

    /// Reconnect delay in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            connection_name: "gas-leak-monitor".to_string(),
            reconnect_delay_ms: 1000,
        }
    }
}

/// Main messaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Enable messaging system
    pub enabled: bool,

    /// Backend to use
    pub backend: MessagingBackend,

    /// Topic prefix, joined to topic names with a dot
    pub topic_prefix: String,

    /// Publish results of bus predictions on the prediction topic
    pub publish_predictions: bool,

    /// NATS configuration
    pub nats: NatsConfig,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: MessagingBackend::Nats,
            topic_prefix: "sensors".to_string(),
            publish_predictions: true,
            nats: NatsConfig::default(),
        }
    }
}

impl MessagingConfig {
    /// Get full topic name with prefix
    pub fn full_topic(&self, topic: &str) -> String {
        if self.topic_prefix.is_empty() {
            topic.to_string()
        } else {
            format!("{}.{}", self.topic_prefix, topic)
        }
    }

    /// In-memory configuration for tests and local runs
    pub fn in_memory() -> Self {
        Self {
            backend: MessagingBackend::InMemory,
            ..Default::default()
        }
    }
}
