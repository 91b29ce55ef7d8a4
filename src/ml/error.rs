use crate::error::AppError;
use thiserror::Error;

/// Errors raised by the trainer, the artifact layer and model scoring
#[derive(Error, Debug)]
pub enum MlError {
    #[error("insufficient labeled data: found {found}, need at least {required}")]
    InsufficientData { found: usize, required: usize },

    #[error("labeled data contains a single class; both leak and no-leak samples are required")]
    SingleClassData,

    #[error("temporal split left an empty partition (train: {train}, test: {test})")]
    EmptyPartition { train: usize, test: usize },

    #[error("model artifact is corrupt: {0}")]
    ModelArtifactCorrupt(String),

    #[error("prediction failed: {0}")]
    PredictionFailure(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("training is already in progress")]
    TrainingInProgress,

    #[error("training was cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MlError {
    /// Short label used for metrics and run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            MlError::InsufficientData { .. } => "insufficient_data",
            MlError::SingleClassData => "single_class_data",
            MlError::EmptyPartition { .. } => "empty_partition",
            MlError::ModelArtifactCorrupt(_) => "artifact_corrupt",
            MlError::PredictionFailure(_) => "prediction_failure",
            MlError::Training(_) => "training",
            MlError::TrainingInProgress => "in_progress",
            MlError::Cancelled => "cancelled",
            MlError::Storage(_) => "storage",
            MlError::Io(_) => "io",
        }
    }
}

impl From<MlError> for AppError {
    fn from(err: MlError) -> Self {
        match err {
            MlError::TrainingInProgress => AppError::Conflict(err.to_string()),
            MlError::Storage(msg) => AppError::Database(msg),
            MlError::Io(e) => AppError::Io(e),
            other => AppError::Model(other.to_string()),
        }
    }
}

impl From<AppError> for MlError {
    fn from(err: AppError) -> Self {
        MlError::Storage(err.to_string())
    }
}
