use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use strum::{Display, EnumString};

/// Probability above which a reading is DANGER
pub const DANGER_THRESHOLD: f64 = 0.7;

/// Probability above which a reading is WARNING
pub const WARNING_THRESHOLD: f64 = 0.4;

/// Classifier and trainer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLConfig {
    /// Where the trained model artifact is written and loaded from
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Minimum labeled samples before a training run is attempted
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Share of the (time-ordered) samples used for fitting
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,

    /// Trees in the forest
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Maximum depth of each tree
    #[serde(default = "default_max_depth")]
    pub max_depth: u16,

    /// Minimum samples per leaf
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,

    /// Seed for bootstrap and feature sampling
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Train once at startup after loading any existing artifact
    #[serde(default)]
    pub train_on_startup: bool,
}

impl Default for MLConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            min_samples: default_min_samples(),
            train_fraction: default_train_fraction(),
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            min_samples_leaf: default_min_samples_leaf(),
            seed: default_seed(),
            train_on_startup: false,
        }
    }
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("./data/models/leak_model.bin")
}

fn default_min_samples() -> usize {
    20
}

fn default_train_fraction() -> f64 {
    0.8
}

fn default_n_trees() -> usize {
    100
}

fn default_max_depth() -> u16 {
    12
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

/// Severity reported for a reading
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LeakStatus {
    Safe,
    Warning,
    Danger,
}

impl LeakStatus {
    /// Fixed thresholds: > 0.7 DANGER, > 0.4 WARNING, otherwise SAFE
    pub fn from_probability(probability: f64) -> Self {
        if probability > DANGER_THRESHOLD {
            LeakStatus::Danger
        } else if probability > WARNING_THRESHOLD {
            LeakStatus::Warning
        } else {
            LeakStatus::Safe
        }
    }
}

/// What produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PredictionSource {
    /// The trained model
    Model,
    /// The fixed rule used while no model is available
    Placeholder,
}

/// Live prediction for one reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub status: LeakStatus,

    /// Leak probability in [0, 1]
    pub probability: f64,

    pub source: PredictionSource,

    pub predicted_at: DateTime<Utc>,
}

impl PredictionResult {
    pub fn new(status: LeakStatus, probability: f64, source: PredictionSource) -> Self {
        Self {
            status,
            probability,
            source,
            predicted_at: Utc::now(),
        }
    }

    /// Score from the trained model, status derived from the probability
    pub fn from_model(probability: f64) -> Self {
        Self::new(
            LeakStatus::from_probability(probability),
            probability,
            PredictionSource::Model,
        )
    }
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Held-out evaluation of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Keyed by class name (`no_leak`, `leak`)
    pub per_class: BTreeMap<String, ClassMetrics>,

    pub accuracy: f64,

    /// Macro-averaged F1
    pub macro_f1: f64,

    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[usize; 2]; 2],

    /// Test-set size
    pub support: usize,
}

impl ClassificationReport {
    /// Compare true and predicted class indices (0 = no leak, 1 = leak)
    pub fn from_predictions(y_true: &[i32], y_pred: &[i32]) -> Self {
        let n_samples = y_true.len();
        let mut confusion = [[0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let t = usize::from(t == 1);
            let p = usize::from(p == 1);
            confusion[t][p] += 1;
        }

        let accuracy = if n_samples > 0 {
            (confusion[0][0] + confusion[1][1]) as f64 / n_samples as f64
        } else {
            0.0
        };

        let mut per_class = BTreeMap::new();
        for (class_idx, name) in [(0usize, "no_leak"), (1usize, "leak")] {
            let other = 1 - class_idx;
            let tp = confusion[class_idx][class_idx];
            let fp = confusion[other][class_idx];
            let fn_count = confusion[class_idx][other];

            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_count);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                name.to_string(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score,
                    support: tp + fn_count,
                },
            );
        }

        let macro_f1 = per_class.values().map(|m| m.f1_score).sum::<f64>() / 2.0;

        Self {
            per_class,
            accuracy,
            macro_f1,
            confusion_matrix: confusion,
            support: n_samples,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// Provenance of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: DateTime<Utc>,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub n_trees: usize,
    pub max_depth: u16,
    pub seed: u64,
}

/// How the last training run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainingOutcome {
    Succeeded {
        report: ClassificationReport,
    },
    Failed {
        kind: String,
        reason: String,
    },
}

/// Summary of one training run, exposed on the model status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: TrainingOutcome,
}

impl TrainingRun {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, TrainingOutcome::Succeeded { .. })
    }
}

/// Result of asking for a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainTrigger {
    Started,
    AlreadyRunning,
}

/// Model status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    /// Artifact file exists on disk
    pub model_available: bool,

    /// A trained model is serving predictions
    pub model_loaded: bool,

    pub trained_at: Option<DateTime<Utc>>,

    pub training_in_progress: bool,

    pub last_run: Option<TrainingRun>,
}
