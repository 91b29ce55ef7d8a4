use crate::error::{AppError, Result};
use crate::metrics::{MODEL_LOADED, PREDICTIONS_TOTAL, TRAINING_DURATION_SECONDS, TRAINING_RUNS_TOTAL};
use crate::ml::artifact;
use crate::ml::classifier::{Classifier, ModelHandle, TrainedModel};
use crate::ml::error::MlError;
use crate::ml::features::engineer_features;
use crate::ml::models::{
    MLConfig, ModelStatus, PredictionResult, TrainTrigger, TrainingOutcome, TrainingRun,
};
use crate::ml::trainer::{CancellationFlag, Trainer};
use crate::models::Reading;
use crate::state::ReadingStore;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Owns the model in service, the artifact on disk and the training guard.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct MlService {
    config: Arc<MLConfig>,
    classifier: Classifier,
    store: Arc<dyn ReadingStore>,

    /// Held for the whole duration of a training run
    training_lock: Arc<Mutex<()>>,

    cancel: CancellationFlag,
    latest_prediction: Arc<RwLock<Option<PredictionResult>>>,
    last_run: Arc<RwLock<Option<TrainingRun>>>,
    running: Arc<tokio::sync::RwLock<bool>>,
}

impl MlService {
    pub fn new(config: MLConfig, store: Arc<dyn ReadingStore>) -> Self {
        Self {
            config: Arc::new(config),
            classifier: Classifier::new(ModelHandle::new()),
            store,
            training_lock: Arc::new(Mutex::new(())),
            cancel: CancellationFlag::new(),
            latest_prediction: Arc::new(RwLock::new(None)),
            last_run: Arc::new(RwLock::new(None)),
            running: Arc::new(tokio::sync::RwLock::new(false)),
        }
    }

    /// Load the existing artifact, then optionally train once
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if *running {
            return Err(AppError::Internal("ML service already running".to_string()));
        }
        *running = true;
        drop(running);

        self.cancel.reset();
        info!(artifact = %self.config.artifact_path.display(), "Starting ML service");

        match self.load_artifact().await {
            Ok(true) => info!("Loaded trained model from artifact"),
            Ok(false) => info!("No model artifact found, serving placeholder predictions"),
            Err(e) => warn!(error = %e, "Ignoring unreadable model artifact"),
        }

        if self.config.train_on_startup {
            if let Err(e) = self.train().await {
                warn!(error = %e, "Startup training did not produce a model");
            }
        }

        Ok(())
    }

    /// Signal any in-flight training run to stop
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.write().await;
        *running = false;
        self.cancel.cancel();
        info!("Stopping ML service");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub fn config(&self) -> &MLConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn model_handle(&self) -> &ModelHandle {
        self.classifier.handle()
    }

    /// Swap in the artifact from disk. Returns `Ok(false)` when there is none;
    /// on error the current model stays in place.
    pub async fn load_artifact(&self) -> std::result::Result<bool, MlError> {
        let path = self.config.artifact_path.clone();
        if !artifact::model_available(&path) {
            return Ok(false);
        }

        let model = tokio::task::spawn_blocking(move || artifact::load(&path))
            .await
            .map_err(|e| MlError::Training(format!("artifact load task failed: {}", e)))??;

        self.install(model);
        Ok(true)
    }

    fn install(&self, model: TrainedModel) {
        let trained_at = model.metadata().trained_at;
        self.model_handle().replace(model);
        MODEL_LOADED.set(1);
        info!(%trained_at, "Model installed");
    }

    /// Artifact exists on disk; the file is not read
    pub fn model_available(&self) -> bool {
        artifact::model_available(&self.config.artifact_path)
    }

    /// Score a reading and remember the result as the latest prediction
    pub fn predict(&self, reading: &Reading) -> PredictionResult {
        let features = engineer_features(reading);
        let result = self.classifier.predict(&features);

        PREDICTIONS_TOTAL
            .with_label_values(&[&result.status.to_string(), &result.source.to_string()])
            .inc();
        *self.latest_prediction.write() = Some(result.clone());

        result
    }

    pub fn latest_prediction(&self) -> Option<PredictionResult> {
        self.latest_prediction.read().clone()
    }

    /// Start a training run in the background and return immediately
    pub fn train_now(&self) -> TrainTrigger {
        let guard = match self.training_lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                info!("Training trigger ignored, a run is already in progress");
                return TrainTrigger::AlreadyRunning;
            }
        };

        let service = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = service.run_training().await {
                error!(error = %e, "Training run failed");
            }
        });

        TrainTrigger::Started
    }

    /// Run training to completion on the caller's task
    pub async fn train(&self) -> std::result::Result<TrainingRun, MlError> {
        let _guard = self
            .training_lock
            .try_lock()
            .map_err(|_| MlError::TrainingInProgress)?;

        self.run_training().await
    }

    pub fn training_in_progress(&self) -> bool {
        self.training_lock.try_lock().is_err()
    }

    async fn run_training(&self) -> std::result::Result<TrainingRun, MlError> {
        let started_at = Utc::now();
        let timer = Instant::now();
        info!("Training run started");

        let result = self.fit_and_persist().await;
        TRAINING_DURATION_SECONDS.observe(timer.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(model) => {
                TRAINING_RUNS_TOTAL.with_label_values(&["succeeded"]).inc();
                info!(
                    accuracy = model.report().accuracy,
                    elapsed_ms = timer.elapsed().as_millis() as u64,
                    "Training run completed"
                );
                TrainingOutcome::Succeeded {
                    report: model.report().clone(),
                }
            }
            Err(e) => {
                TRAINING_RUNS_TOTAL.with_label_values(&["failed"]).inc();
                warn!(kind = e.kind(), error = %e, "Training run aborted, current model unchanged");
                TrainingOutcome::Failed {
                    kind: e.kind().to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let run = TrainingRun {
            started_at,
            finished_at: Utc::now(),
            outcome,
        };
        *self.last_run.write() = Some(run.clone());

        result.map(|_| run)
    }

    /// Fit, write the artifact, then reload it from disk into the handle
    async fn fit_and_persist(&self) -> std::result::Result<Arc<TrainedModel>, MlError> {
        let samples = self.store.list_labeled_samples().await?;
        info!(samples = samples.len(), "Fetched labeled history");

        let trainer = Trainer::new((*self.config).clone());
        let cancel = self.cancel.clone();
        let path = self.config.artifact_path.clone();

        tokio::task::spawn_blocking(move || -> std::result::Result<(), MlError> {
            let model = trainer.run(samples, &cancel)?;
            cancel.check()?;
            artifact::save(&model, &path)
        })
        .await
        .map_err(|e| MlError::Training(format!("training task failed: {}", e)))??;

        match self.load_artifact().await {
            Ok(true) => {}
            Ok(false) => {
                return Err(MlError::ModelArtifactCorrupt(
                    "artifact disappeared after write".to_string(),
                ))
            }
            Err(e) => {
                error!(error = %e, "Reload of new artifact failed, previous model kept");
                return Err(e);
            }
        }

        self.model_handle()
            .current()
            .ok_or_else(|| MlError::Training("no model installed after reload".to_string()))
    }

    pub fn model_status(&self) -> ModelStatus {
        let current = self.model_handle().current();
        ModelStatus {
            model_available: self.model_available(),
            model_loaded: current.is_some(),
            trained_at: current.map(|m| m.metadata().trained_at),
            training_in_progress: self.training_in_progress(),
            last_run: self.last_run.read().clone(),
        }
    }
}
