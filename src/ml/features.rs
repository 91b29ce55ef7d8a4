use crate::models::Reading;
use serde::{Deserialize, Serialize};

/// Number of model inputs
pub const FEATURE_COUNT: usize = 17;

/// Feature layout shared by training and live scoring.
///
/// A model artifact records the layout it was fitted on; scoring refuses to
/// run against a different one.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "worker_1_mean",
    "worker_1_min",
    "worker_1_max",
    "worker_1_var",
    "worker_2_mean",
    "worker_2_min",
    "worker_2_max",
    "worker_2_var",
    "worker_3_mean",
    "worker_3_min",
    "worker_3_max",
    "worker_3_var",
    "humidity",
    "temperature",
    "spatial_variance",
    "max_all_sensors",
    "avg_all_sensors",
];

/// Model inputs for one reading: the raw fields with absent values filled
/// with zero, plus three statistics across the worker means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineeredFeatures {
    pub worker_1_mean: f64,
    pub worker_1_min: f64,
    pub worker_1_max: f64,
    pub worker_1_var: f64,
    pub worker_2_mean: f64,
    pub worker_2_min: f64,
    pub worker_2_max: f64,
    pub worker_2_var: f64,
    pub worker_3_mean: f64,
    pub worker_3_min: f64,
    pub worker_3_max: f64,
    pub worker_3_var: f64,
    pub humidity: f64,
    pub temperature: f64,

    /// Population variance of the three worker means
    pub spatial_variance: f64,

    /// Largest worker mean
    pub max_all_sensors: f64,

    /// Average worker mean
    pub avg_all_sensors: f64,
}

impl EngineeredFeatures {
    /// Values in `FEATURE_NAMES` order
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.worker_1_mean,
            self.worker_1_min,
            self.worker_1_max,
            self.worker_1_var,
            self.worker_2_mean,
            self.worker_2_min,
            self.worker_2_max,
            self.worker_2_var,
            self.worker_3_mean,
            self.worker_3_min,
            self.worker_3_max,
            self.worker_3_var,
            self.humidity,
            self.temperature,
            self.spatial_variance,
            self.max_all_sensors,
            self.avg_all_sensors,
        ]
    }
}

/// Derive the model inputs for a reading.
///
/// Absent worker means count as zero in the cross-sensor statistics. When
/// every mean is zero (or absent) the three statistics are all zero.
pub fn engineer_features(reading: &Reading) -> EngineeredFeatures {
    let v = |x: Option<f64>| x.unwrap_or(0.0);

    let means = reading.worker_means().map(v);
    let (spatial_variance, max_all_sensors, avg_all_sensors) =
        if means.iter().any(|&m| m != 0.0) {
            let n = means.len() as f64;
            let avg = means.iter().sum::<f64>() / n;
            let variance = means.iter().map(|m| (m - avg).powi(2)).sum::<f64>() / n;
            let max = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (variance, max, avg)
        } else {
            (0.0, 0.0, 0.0)
        };

    EngineeredFeatures {
        worker_1_mean: means[0],
        worker_1_min: v(reading.worker_1_min),
        worker_1_max: v(reading.worker_1_max),
        worker_1_var: v(reading.worker_1_var),
        worker_2_mean: means[1],
        worker_2_min: v(reading.worker_2_min),
        worker_2_max: v(reading.worker_2_max),
        worker_2_var: v(reading.worker_2_var),
        worker_3_mean: means[2],
        worker_3_min: v(reading.worker_3_min),
        worker_3_max: v(reading.worker_3_max),
        worker_3_var: v(reading.worker_3_var),
        humidity: v(reading.humidity),
        temperature: v(reading.temperature),
        spatial_variance,
        max_all_sensors,
        avg_all_sensors,
    }
}

/// Feature layout as owned strings, stored alongside a trained model
pub fn feature_layout() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}
