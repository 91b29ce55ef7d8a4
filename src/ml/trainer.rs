use crate::ml::classifier::TrainedModel;
use crate::ml::error::MlError;
use crate::ml::features::{engineer_features, feature_layout, FEATURE_COUNT};
use crate::ml::forest::{ForestParams, RandomForest};
use crate::ml::models::{ClassificationReport, MLConfig, ModelMetadata};
use crate::ml::scaler::StandardScaler;
use crate::models::LabeledSample;
use chrono::Utc;
use ndarray::Array2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Cooperative stop signal for a training run
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), MlError> {
        if self.is_cancelled() {
            Err(MlError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Sort by timestamp (stable) and cut at `floor(train_fraction * n)`.
///
/// Older samples train, newer samples test. Either side being empty is an
/// error.
pub fn temporal_split(
    mut samples: Vec<LabeledSample>,
    train_fraction: f64,
) -> Result<(Vec<LabeledSample>, Vec<LabeledSample>), MlError> {
    samples.sort_by_key(|s| s.timestamp);

    let n = samples.len();
    let n_train = ((n as f64) * train_fraction).floor() as usize;
    let n_train = n_train.min(n);

    let test = samples.split_off(n_train);
    if samples.is_empty() || test.is_empty() {
        return Err(MlError::EmptyPartition {
            train: samples.len(),
            test: test.len(),
        });
    }
    Ok((samples, test))
}

fn to_matrix(samples: &[LabeledSample]) -> Result<(Array2<f64>, Vec<i32>), MlError> {
    let mut data = Vec::with_capacity(samples.len() * FEATURE_COUNT);
    let mut labels = Vec::with_capacity(samples.len());

    for sample in samples {
        data.extend_from_slice(&engineer_features(&sample.reading).to_vector());
        labels.push(sample.label());
    }

    let x = Array2::from_shape_vec((samples.len(), FEATURE_COUNT), data)
        .map_err(|e| MlError::Training(format!("failed to build feature matrix: {}", e)))?;
    Ok((x, labels))
}

/// Batch job turning labeled history into a `TrainedModel`.
///
/// CPU-bound; callers on an async runtime should run it on a blocking thread.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: MLConfig,
}

impl Trainer {
    pub fn new(config: MLConfig) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        samples: Vec<LabeledSample>,
        cancel: &CancellationFlag,
    ) -> Result<TrainedModel, MlError> {
        let required = self.config.min_samples;
        if samples.len() < required {
            warn!(
                found = samples.len(),
                required, "Not enough labeled samples to train"
            );
            return Err(MlError::InsufficientData {
                found: samples.len(),
                required,
            });
        }

        let leaks = samples.iter().filter(|s| s.is_leak).count();
        if leaks == 0 || leaks == samples.len() {
            warn!(
                samples = samples.len(),
                leaks, "Labeled data contains a single class"
            );
            return Err(MlError::SingleClassData);
        }
        cancel.check()?;

        let (train, test) = temporal_split(samples, self.config.train_fraction)?;
        info!(
            train = train.len(),
            test = test.len(),
            "Training leak classifier"
        );

        let (x_train, y_train) = to_matrix(&train)?;
        let (x_test, y_test) = to_matrix(&test)?;
        cancel.check()?;

        let scaler = StandardScaler::fit(&x_train)?;
        let x_train = scaler.transform(&x_train)?;
        let x_test = scaler.transform(&x_test)?;

        let params = ForestParams {
            n_trees: self.config.n_trees,
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            seed: self.config.seed,
        };
        let forest = RandomForest::fit(&x_train, &y_train, params, cancel)?;
        cancel.check()?;

        let y_pred = forest.predict(&x_test)?;
        let report = ClassificationReport::from_predictions(&y_test, &y_pred);
        log_report(&report);

        let metadata = ModelMetadata {
            trained_at: Utc::now(),
            n_train: train.len(),
            n_test: test.len(),
            n_features: FEATURE_COUNT,
            n_trees: forest.n_trees(),
            max_depth: params.max_depth,
            seed: params.seed,
        };

        Ok(TrainedModel::new(
            feature_layout(),
            scaler,
            forest,
            metadata,
            report,
        ))
    }
}

fn log_report(report: &ClassificationReport) {
    info!(
        accuracy = report.accuracy,
        macro_f1 = report.macro_f1,
        support = report.support,
        "Held-out evaluation"
    );
    for (class, m) in &report.per_class {
        info!(
            class = %class,
            precision = m.precision,
            recall = m.recall,
            f1 = m.f1_score,
            support = m.support,
            "Class metrics"
        );
    }
}
