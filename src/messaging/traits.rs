//! Messaging trait abstractions
//!
//! Payloads cross these traits as raw bytes; decoding happens in the
//! consumer so undecodable messages can be counted and dropped there.

use crate::messaging::error::MessagingResult;
use async_trait::async_trait;

/// A message received from the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Full topic (subject) the message arrived on
    pub topic: String,

    pub payload: Vec<u8>,
}

/// Message producer trait
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Publish a payload to a topic
    async fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> MessagingResult<()>;

    /// Check if the producer is connected
    async fn is_connected(&self) -> bool;

    /// Flush and close the producer connection
    async fn close(&self) -> MessagingResult<()>;
}

/// Message consumer trait
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Subscribe to a topic and receive messages
    async fn subscribe(&self, topic: &str) -> MessagingResult<Box<dyn MessageStream>>;
}

/// Message stream trait for consuming messages
#[async_trait]
pub trait MessageStream: Send {
    /// Next message, or `None` once the subscription has ended
    async fn next(&mut self) -> Option<Message>;
}
