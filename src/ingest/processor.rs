use crate::error::Result;
use crate::messaging::{MessagingService, PREDICTION_TOPIC};
use crate::metrics::READINGS_INGESTED_TOTAL;
use crate::ml::{MlService, PredictionResult};
use crate::models::{SensorPayload, SensorRecord};
use crate::state::ReadingStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Published on the prediction topic for every reading scored from the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEvent {
    pub reading_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub prediction: PredictionResult,
}

/// Persists and scores readings for both the bus and the HTTP API
#[derive(Clone)]
pub struct ReadingProcessor {
    store: Arc<dyn ReadingStore>,
    ml: MlService,
    messaging: Option<Arc<MessagingService>>,
    publish_predictions: bool,
}

impl ReadingProcessor {
    pub fn new(store: Arc<dyn ReadingStore>, ml: MlService) -> Self {
        Self {
            store,
            ml,
            messaging: None,
            publish_predictions: false,
        }
    }

    /// Publish bus predictions through `messaging`
    pub fn with_messaging(mut self, messaging: Arc<MessagingService>) -> Self {
        self.publish_predictions = messaging.config().publish_predictions;
        self.messaging = Some(messaging);
        self
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    pub fn ml(&self) -> &MlService {
        &self.ml
    }

    /// Persist a reading as received
    pub async fn ingest(&self, payload: SensorPayload, source: &str) -> Result<SensorRecord> {
        let record = payload.into_record();
        self.store.save_reading(&record).await?;
        READINGS_INGESTED_TOTAL.with_label_values(&[source]).inc();

        tracing::debug!(
            reading_id = %record.id,
            source,
            labeled = record.is_leak.is_some(),
            "Reading ingested"
        );
        Ok(record)
    }

    /// Score a reading, store it unlabeled and publish the result.
    ///
    /// The prediction is returned even when storing or publishing fails;
    /// those failures are logged.
    pub async fn predict_and_record(&self, payload: SensorPayload) -> PredictionResult {
        let prediction = self.ml.predict(&payload.reading);

        let mut record = payload.into_record();
        record.is_leak = None;

        tracing::info!(
            reading_id = %record.id,
            status = %prediction.status,
            probability = prediction.probability,
            source = %prediction.source,
            "Reading scored"
        );

        match self.store.save_reading(&record).await {
            Ok(()) => READINGS_INGESTED_TOTAL.with_label_values(&["predict"]).inc(),
            Err(e) => tracing::error!(reading_id = %record.id, error = %e, "Failed to store scored reading"),
        }

        if self.publish_predictions {
            if let Some(messaging) = self.messaging.as_ref() {
                let event = PredictionEvent {
                    reading_id: record.id,
                    timestamp: record.timestamp,
                    prediction: prediction.clone(),
                };
                if let Err(e) = messaging.publish(PREDICTION_TOPIC, &event).await {
                    tracing::warn!(reading_id = %record.id, error = %e, "Failed to publish prediction");
                }
            }
        }

        prediction
    }
}
