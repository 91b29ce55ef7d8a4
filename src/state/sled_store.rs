use crate::error::{AppError, Result};
use crate::models::{LabeledSample, SensorRecord};
use crate::state::ReadingStore;
use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Persistent reading store using the Sled embedded database.
///
/// Readings are keyed by `timestamp (micros, big-endian, sign-flipped) ++ id`
/// so tree order is chronological. A second tree maps ids to those keys.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    readings_tree: sled::Tree,
    ids_tree: sled::Tree,
}

impl SledStore {
    /// Open (or create) a store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database: {}", e))
        })?;

        let readings_tree = db.open_tree("readings").map_err(|e| {
            AppError::Database(format!("Failed to open readings tree: {}", e))
        })?;

        let ids_tree = db.open_tree("reading_ids").map_err(|e| {
            AppError::Database(format!("Failed to open reading id index: {}", e))
        })?;

        tracing::info!("Initialized Sled store at {:?}", path_ref);

        Ok(Self {
            db: Arc::new(db),
            readings_tree,
            ids_tree,
        })
    }

    fn serialize_record(record: &SensorRecord) -> Result<Vec<u8>> {
        bincode::serialize(record).map_err(|e| {
            AppError::Serialization(format!("Failed to serialize reading: {}", e))
        })
    }

    fn deserialize_record(bytes: &[u8]) -> Result<SensorRecord> {
        bincode::deserialize(bytes).map_err(|e| {
            AppError::Serialization(format!("Failed to deserialize reading: {}", e))
        })
    }

    /// Chronological key for a record
    fn reading_key(record: &SensorRecord) -> [u8; 24] {
        let micros = record.timestamp.timestamp_micros();
        let ordered = (micros as u64) ^ (1u64 << 63);

        let mut key = [0u8; 24];
        key[..8].copy_from_slice(&ordered.to_be_bytes());
        key[8..].copy_from_slice(record.id.as_bytes());
        key
    }

    fn lookup_key(&self, id: &Uuid) -> Result<Option<sled::IVec>> {
        self.ids_tree
            .get(id.as_bytes())
            .map_err(|e| AppError::Database(format!("Failed to read reading index: {}", e)))
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(|e| {
            AppError::Database(format!("Failed to flush database: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl ReadingStore for SledStore {
    async fn save_reading(&self, record: &SensorRecord) -> Result<()> {
        let key = Self::reading_key(record);
        let value = Self::serialize_record(record)?;

        // Same id saved twice with a different timestamp must not leave a stale row
        if let Some(old_key) = self.lookup_key(&record.id)? {
            if old_key[..] != key[..] {
                self.readings_tree.remove(old_key)?;
            }
        }

        self.readings_tree.insert(key, value).map_err(|e| {
            AppError::Database(format!("Failed to save reading: {}", e))
        })?;
        self.ids_tree.insert(record.id.as_bytes(), &key[..]).map_err(|e| {
            AppError::Database(format!("Failed to update reading index: {}", e))
        })?;

        tracing::debug!(reading_id = %record.id, "Reading saved to Sled");
        Ok(())
    }

    async fn get_reading(&self, id: &Uuid) -> Result<Option<SensorRecord>> {
        let Some(key) = self.lookup_key(id)? else {
            return Ok(None);
        };

        match self.readings_tree.get(&key) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_record(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::Database(format!("Failed to get reading: {}", e))),
        }
    }

    async fn set_label(&self, id: &Uuid, is_leak: Option<bool>) -> Result<SensorRecord> {
        let mut record = self
            .get_reading(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reading {} not found", id)))?;

        record.is_leak = is_leak;
        let value = Self::serialize_record(&record)?;
        self.readings_tree
            .insert(Self::reading_key(&record), value)
            .map_err(|e| AppError::Database(format!("Failed to update reading: {}", e)))?;

        self.readings_tree.flush().map_err(|e| {
            AppError::Database(format!("Failed to flush readings tree: {}", e))
        })?;

        tracing::debug!(reading_id = %id, ?is_leak, "Reading labeled");
        Ok(record)
    }

    async fn list_readings(&self, skip: usize, limit: usize) -> Result<Vec<SensorRecord>> {
        let mut records = Vec::with_capacity(limit.min(1024));

        for result in self.readings_tree.iter().rev().skip(skip).take(limit) {
            let (_, value) = result.map_err(|e| {
                AppError::Database(format!("Failed to iterate readings: {}", e))
            })?;
            records.push(Self::deserialize_record(&value)?);
        }

        Ok(records)
    }

    async fn count_readings(&self) -> Result<u64> {
        Ok(self.readings_tree.len() as u64)
    }

    async fn list_labeled_samples(&self) -> Result<Vec<LabeledSample>> {
        let mut samples = Vec::new();

        for result in self.readings_tree.iter() {
            let (_, value) = result.map_err(|e| {
                AppError::Database(format!("Failed to iterate readings: {}", e))
            })?;
            if let Some(sample) = Self::deserialize_record(&value)?.labeled_sample() {
                samples.push(sample);
            }
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reading;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn create_test_store() -> (SledStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStore::new(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_keys_sort_chronologically() {
        let mut before_epoch = SensorRecord::new(Reading::default());
        before_epoch.timestamp = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        let mut after_epoch = SensorRecord::new(Reading::default());
        after_epoch.timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(SledStore::reading_key(&before_epoch) < SledStore::reading_key(&after_epoch));
    }

    #[tokio::test]
    async fn test_save_and_get_reading() {
        let (store, _temp_dir) = create_test_store();
        let record = SensorRecord::new(Reading {
            worker_1_mean: Some(401.5),
            humidity: Some(38.0),
            ..Default::default()
        });

        store.save_reading(&record).await.unwrap();

        let retrieved = store.get_reading(&record.id).await.unwrap();
        assert_eq!(retrieved, Some(record));
    }

    #[tokio::test]
    async fn test_get_missing_reading() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.get_reading(&Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_label_round_trip() {
        let (store, _temp_dir) = create_test_store();
        let record = SensorRecord::new(Reading::default());
        store.save_reading(&record).await.unwrap();

        let labeled = store.set_label(&record.id, Some(true)).await.unwrap();
        assert_eq!(labeled.is_leak, Some(true));

        let samples = store.list_labeled_samples().await.unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].is_leak);
        assert_eq!(store.count_readings().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resave_with_new_timestamp_keeps_one_row() {
        let (store, _temp_dir) = create_test_store();
        let mut record = SensorRecord::new(Reading::default());
        store.save_reading(&record).await.unwrap();

        record.timestamp = record.timestamp + chrono::Duration::seconds(30);
        store.save_reading(&record).await.unwrap();

        assert_eq!(store.count_readings().await.unwrap(), 1);
        let stored = store.get_reading(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.timestamp, record.timestamp);
    }
}
