pub mod factory;
pub mod sled_store;
pub mod store;

pub use factory::{create_in_memory_store, create_store};
pub use sled_store::SledStore;
pub use store::InMemoryStore;

use crate::error::Result;
use crate::models::{LabeledSample, SensorRecord};
use async_trait::async_trait;
use uuid::Uuid;

/// Trait for sensor reading storage operations
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a reading. Duplicates are stored as separate rows.
    async fn save_reading(&self, record: &SensorRecord) -> Result<()>;

    /// Get a reading by ID
    async fn get_reading(&self, id: &Uuid) -> Result<Option<SensorRecord>>;

    /// Set or clear the operator label; `NotFound` for unknown IDs
    async fn set_label(&self, id: &Uuid, is_leak: Option<bool>) -> Result<SensorRecord>;

    /// Page through readings, newest first
    async fn list_readings(&self, skip: usize, limit: usize) -> Result<Vec<SensorRecord>>;

    /// Total number of stored readings
    async fn count_readings(&self) -> Result<u64>;

    /// Every labeled reading, oldest first
    async fn list_labeled_samples(&self) -> Result<Vec<LabeledSample>>;
}
