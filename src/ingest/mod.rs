//! Bus ingestion: topic handlers for readings, prediction requests and
//! training triggers, plus the shared reading processor the HTTP API uses.

mod handlers;
mod processor;
mod router;

pub use handlers::{DataHandler, PredictHandler, TrainHandler};
pub use processor::{PredictionEvent, ReadingProcessor};
pub use router::{IngestError, MessageRouter, RouterHandle, TopicHandler};

use crate::messaging::{DATA_TOPIC, PREDICT_TOPIC, TRAIN_TOPIC};
use std::sync::Arc;

/// Router with the data, predict and train topics wired to `processor`
pub fn build_router(processor: &ReadingProcessor) -> MessageRouter {
    MessageRouter::new()
        .route(DATA_TOPIC, Arc::new(DataHandler::new(processor.clone())))
        .route(PREDICT_TOPIC, Arc::new(PredictHandler::new(processor.clone())))
        .route(TRAIN_TOPIC, Arc::new(TrainHandler::new(processor.ml().clone())))
}
