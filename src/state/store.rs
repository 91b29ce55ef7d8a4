use crate::error::{AppError, Result};
use crate::models::{LabeledSample, SensorRecord};
use crate::state::ReadingStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory reading store (for development and testing)
#[derive(Clone)]
pub struct InMemoryStore {
    readings: Arc<DashMap<Uuid, SensorRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            readings: Arc::new(DashMap::new()),
        }
    }

    /// Snapshot sorted oldest first; ties broken by ID like the sled key order
    fn sorted(&self) -> Vec<SensorRecord> {
        let mut records: Vec<SensorRecord> = self
            .readings
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        records
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadingStore for InMemoryStore {
    async fn save_reading(&self, record: &SensorRecord) -> Result<()> {
        self.readings.insert(record.id, record.clone());
        tracing::debug!(reading_id = %record.id, "Reading saved");
        Ok(())
    }

    async fn get_reading(&self, id: &Uuid) -> Result<Option<SensorRecord>> {
        Ok(self.readings.get(id).map(|entry| entry.clone()))
    }

    async fn set_label(&self, id: &Uuid, is_leak: Option<bool>) -> Result<SensorRecord> {
        let mut entry = self
            .readings
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Reading {} not found", id)))?;

        entry.is_leak = is_leak;
        tracing::debug!(reading_id = %id, ?is_leak, "Reading labeled");
        Ok(entry.clone())
    }

    async fn list_readings(&self, skip: usize, limit: usize) -> Result<Vec<SensorRecord>> {
        Ok(self
            .sorted()
            .into_iter()
            .rev()
            .skip(skip)
            .take(limit)
            .collect())
    }

    async fn count_readings(&self) -> Result<u64> {
        Ok(self.readings.len() as u64)
    }

    async fn list_labeled_samples(&self) -> Result<Vec<LabeledSample>> {
        Ok(self
            .sorted()
            .iter()
            .filter_map(SensorRecord::labeled_sample)
            .collect())
    }
}
