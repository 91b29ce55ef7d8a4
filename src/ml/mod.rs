//! Leak classification: feature engineering, the classifier with its
//! placeholder fallback, the trainer and the model artifact.

pub mod artifact;
pub mod classifier;
pub mod error;
pub mod features;
pub mod forest;
pub mod models;
pub mod scaler;
pub mod service;
pub mod trainer;

pub use classifier::{placeholder_rule, Classifier, ModelHandle, TrainedModel};
pub use error::MlError;
pub use features::{engineer_features, EngineeredFeatures, FEATURE_COUNT, FEATURE_NAMES};
pub use models::{
    ClassMetrics, ClassificationReport, LeakStatus, MLConfig, ModelMetadata, ModelStatus,
    PredictionResult, PredictionSource, TrainTrigger, TrainingOutcome, TrainingRun,
};
pub use service::MlService;
pub use trainer::{temporal_split, CancellationFlag, Trainer};
