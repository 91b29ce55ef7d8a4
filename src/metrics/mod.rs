//! Prometheus metrics for the gas leak monitor.
//!
//! All collectors live in a dedicated registry that `init_metrics` populates
//! once at startup; `gather_metrics` renders it in the text exposition format
//! for `GET /metrics`.
//!
//! ```no_run
//! use gas_leak_monitor::metrics::READINGS_INGESTED_TOTAL;
//!
//! READINGS_INGESTED_TOTAL.with_label_values(&["http"]).inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

const NAMESPACE: &str = "glm";

lazy_static! {
    /// Registry for every metric exported by this service
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Readings persisted
    ///
    /// Labels: source (bus, predict, http)
    pub static ref READINGS_INGESTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("readings_ingested_total", "Total number of sensor readings persisted")
            .namespace(NAMESPACE),
        &["source"]
    ).expect("Failed to create READINGS_INGESTED_TOTAL metric");

    /// Messages dropped because they could not be decoded
    ///
    /// Labels: topic
    pub static ref INGEST_MALFORMED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("ingest_malformed_total", "Total number of malformed messages dropped")
            .namespace(NAMESPACE),
        &["topic"]
    ).expect("Failed to create INGEST_MALFORMED_TOTAL metric");

    /// Predictions served
    ///
    /// Labels: status, source (model, placeholder)
    pub static ref PREDICTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("predictions_total", "Total number of leak predictions served")
            .namespace(NAMESPACE),
        &["status", "source"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Training runs
    ///
    /// Labels: outcome (succeeded, failed)
    pub static ref TRAINING_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("training_runs_total", "Total number of training runs")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create TRAINING_RUNS_TOTAL metric");

    pub static ref TRAINING_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("training_duration_seconds", "Training run duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
    ).expect("Failed to create TRAINING_DURATION_SECONDS metric");

    /// Messages published on the bus
    ///
    /// Labels: topic, backend
    pub static ref MESSAGES_PUBLISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("messages_published_total", "Total number of messages published")
            .namespace(NAMESPACE),
        &["topic", "backend"]
    ).expect("Failed to create MESSAGES_PUBLISHED_TOTAL metric");

    /// Labels: topic, backend
    pub static ref PUBLISH_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("publish_failures_total", "Total number of failed publishes")
            .namespace(NAMESPACE),
        &["topic", "backend"]
    ).expect("Failed to create PUBLISH_FAILURES_TOTAL metric");

    /// Messages received from the bus, before decoding
    ///
    /// Labels: topic
    pub static ref MESSAGES_CONSUMED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("messages_consumed_total", "Total number of messages consumed")
            .namespace(NAMESPACE),
        &["topic"]
    ).expect("Failed to create MESSAGES_CONSUMED_TOTAL metric");

    /// 1 while a trained model is serving predictions
    pub static ref MODEL_LOADED: IntGauge = IntGauge::with_opts(
        Opts::new("model_loaded", "Whether a trained model is loaded")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");
}

/// Register all collectors with the registry.
///
/// Call once per process; a second call returns `AlreadyReg`.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(READINGS_INGESTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INGEST_MALFORMED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(TRAINING_RUNS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(TRAINING_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_LOADED.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MESSAGES_PUBLISHED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PUBLISH_FAILURES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MESSAGES_CONSUMED_TOTAL.clone()))?;

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Render the registry in the Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
