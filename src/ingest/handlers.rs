use crate::ingest::processor::ReadingProcessor;
use crate::ingest::router::{IngestError, TopicHandler};
use crate::ml::{MlService, TrainTrigger};
use crate::models::SensorPayload;
use async_trait::async_trait;

fn decode(payload: &[u8]) -> Result<SensorPayload, IngestError> {
    Ok(serde_json::from_slice(payload)?)
}

/// `data`: persist the reading, label included when present
pub struct DataHandler {
    processor: ReadingProcessor,
}

impl DataHandler {
    pub fn new(processor: ReadingProcessor) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl TopicHandler for DataHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), IngestError> {
        let payload = decode(payload)?;
        self.processor.ingest(payload, "bus").await?;
        Ok(())
    }
}

/// `predict`: score the reading, store it unlabeled and publish the result
pub struct PredictHandler {
    processor: ReadingProcessor,
}

impl PredictHandler {
    pub fn new(processor: ReadingProcessor) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl TopicHandler for PredictHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), IngestError> {
        let payload = decode(payload)?;
        self.processor.predict_and_record(payload).await;
        Ok(())
    }
}

/// `train`: any payload starts a background training run
pub struct TrainHandler {
    ml: MlService,
}

impl TrainHandler {
    pub fn new(ml: MlService) -> Self {
        Self { ml }
    }
}

#[async_trait]
impl TopicHandler for TrainHandler {
    async fn handle(&self, _payload: &[u8]) -> Result<(), IngestError> {
        if self.ml.train_now() == TrainTrigger::AlreadyRunning {
            tracing::info!("Training already running, trigger from bus ignored");
        }
        Ok(())
    }
}
