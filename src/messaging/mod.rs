//! Publish/subscribe plumbing for sensor telemetry
//!
//! Readings, prediction requests and training triggers arrive on topics under
//! a common prefix (default `sensors`):
//!
//! ```text
//! sensors.data        reading to persist (label optional)
//! sensors.predict     reading to score; result goes to sensors.prediction
//! sensors.train       any payload starts a training run
//! ```
//!
//! Two backends sit behind the `MessageProducer` / `MessageConsumer` traits:
//! a NATS client and an in-process broadcast bus.
//!
//! # Example
//!
//! ```no_run
//! use gas_leak_monitor::messaging::{MessagingConfig, MessagingService, DATA_TOPIC};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let messaging = MessagingService::new(MessagingConfig::default()).await?;
//!
//!     let reading = serde_json::json!({ "worker_1_mean": 512.0, "humidity": 41.0 });
//!     messaging.publish(DATA_TOPIC, &reading).await?;
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod memory;
mod nats;
mod service;
mod traits;

pub use config::{
    MessagingBackend, MessagingConfig, NatsConfig, DATA_TOPIC, PREDICTION_TOPIC, PREDICT_TOPIC,
    TRAIN_TOPIC,
};
pub use error::{MessagingError, MessagingResult};
pub use memory::InMemoryBus;
pub use nats::NatsClient;
pub use service::MessagingService;
pub use traits::{Message, MessageConsumer, MessageProducer, MessageStream};
