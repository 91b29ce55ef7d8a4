use crate::ml::error::MlError;
use crate::ml::features::{EngineeredFeatures, FEATURE_NAMES};
use crate::ml::forest::RandomForest;
use crate::ml::models::{
    ClassificationReport, LeakStatus, ModelMetadata, PredictionResult, PredictionSource,
};
use crate::ml::scaler::StandardScaler;
use ndarray::Array1;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bumped whenever the serialized layout of `TrainedModel` changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// A fitted scaler and forest plus everything needed to check that a reading
/// is scored against the layout the model was trained on.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModel {
    format_version: u32,
    feature_names: Vec<String>,
    scaler: StandardScaler,
    forest: RandomForest,
    metadata: ModelMetadata,
    report: ClassificationReport,
}

impl TrainedModel {
    pub fn new(
        feature_names: Vec<String>,
        scaler: StandardScaler,
        forest: RandomForest,
        metadata: ModelMetadata,
        report: ClassificationReport,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_names,
            scaler,
            forest,
            metadata,
            report,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn report(&self) -> &ClassificationReport {
        &self.report
    }

    /// Structural checks run on every artifact read from disk
    pub fn validate(&self) -> Result<(), MlError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(MlError::ModelArtifactCorrupt(format!(
                "unsupported artifact format {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if !self.has_current_layout() {
            return Err(MlError::ModelArtifactCorrupt(
                "artifact feature layout does not match this build".to_string(),
            ));
        }
        if self.scaler.n_features() != self.feature_names.len()
            || self.forest.n_features() != self.feature_names.len()
        {
            return Err(MlError::ModelArtifactCorrupt(format!(
                "inconsistent widths: layout {}, scaler {}, forest {}",
                self.feature_names.len(),
                self.scaler.n_features(),
                self.forest.n_features()
            )));
        }
        Ok(())
    }

    fn has_current_layout(&self) -> bool {
        self.feature_names.len() == FEATURE_NAMES.len()
            && self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .all(|(a, b)| a == b)
    }

    /// Leak probability for one reading
    pub fn predict_proba(&self, features: &EngineeredFeatures) -> Result<f64, MlError> {
        if !self.has_current_layout() {
            return Err(MlError::PredictionFailure(
                "model was trained on a different feature layout".to_string(),
            ));
        }

        let row = Array1::from(features.to_vector().to_vec());
        let scaled = self.scaler.transform_row(row.view())?;
        let probability = self.forest.predict_proba(scaled.view())?;

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(MlError::PredictionFailure(format!(
                "probability out of range: {}",
                probability
            )));
        }
        Ok(probability)
    }
}

/// Shared slot holding the model currently in service.
///
/// Readers take an `Arc` snapshot, so a swap never exposes a half-built
/// model and in-flight predictions finish on the model they started with.
#[derive(Clone, Default)]
pub struct ModelHandle {
    inner: Arc<RwLock<Option<Arc<TrainedModel>>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        self.inner.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Install a model, returning the one it replaced
    pub fn replace(&self, model: TrainedModel) -> Option<Arc<TrainedModel>> {
        self.inner.write().replace(Arc::new(model))
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Fixed rule used while no model is available.
///
/// M = max_all_sensors, V = spatial_variance:
/// M > 850 or (V > 15000 and M > 500) is DANGER, M > 600 is WARNING.
pub fn placeholder_rule(features: &EngineeredFeatures) -> PredictionResult {
    let m = features.max_all_sensors;
    let v = features.spatial_variance;

    let (status, probability) = if m > 850.0 || (v > 15_000.0 && m > 500.0) {
        (LeakStatus::Danger, 0.95)
    } else if m > 600.0 {
        (LeakStatus::Warning, 0.60)
    } else {
        (LeakStatus::Safe, 0.05)
    };

    PredictionResult::new(status, probability, PredictionSource::Placeholder)
}

/// Scores readings against whatever model the handle currently holds
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    handle: ModelHandle,
}

impl Classifier {
    pub fn new(handle: ModelHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    /// Never fails: without a usable model the placeholder rule answers
    pub fn predict(&self, features: &EngineeredFeatures) -> PredictionResult {
        let Some(model) = self.handle.current() else {
            debug!("No trained model loaded, using placeholder rule");
            return placeholder_rule(features);
        };

        match model.predict_proba(features) {
            Ok(probability) => PredictionResult::from_model(probability),
            Err(e) => {
                warn!(error = %e, "Model scoring failed, using placeholder rule");
                placeholder_rule(features)
            }
        }
    }
}
