use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::{ModelStatus, PredictionResult, TrainTrigger};
use crate::models::{Reading, SensorPayload, SensorRecord};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Gas leak monitor is running".to_string(),
    })
}

/// Liveness
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Readiness: the store answers and, when enabled, the bus is connected
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let store_ready = match state.processor.store().count_readings().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness: store unavailable");
            false
        }
    };

    let messaging_connected = match state.messaging.as_ref() {
        Some(messaging) if messaging.is_enabled() => Some(messaging.is_connected().await),
        _ => None,
    };

    let ready = store_ready && messaging_connected.unwrap_or(true);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            store: store_ready,
            messaging: messaging_connected,
            model_loaded: state.processor.ml().model_handle().is_loaded(),
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub store: bool,
    pub messaging: Option<bool>,
    pub model_loaded: bool,
}

/// Stored reading with its sensor values at the top level
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadingResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub reading: Reading,
    pub is_leak: Option<bool>,
}

impl From<SensorRecord> for ReadingResponse {
    fn from(record: SensorRecord) -> Self {
        Self {
            id: record.id,
            timestamp: record.timestamp,
            reading: record.reading,
            is_leak: record.is_leak,
        }
    }
}

/// Persist a reading
pub async fn create_reading(
    State(state): State<AppState>,
    Json(payload): Json<SensorPayload>,
) -> Result<(StatusCode, Json<ReadingResponse>)> {
    let record = state.processor.ingest(payload, "http").await?;
    Ok((StatusCode::CREATED, Json(ReadingResponse::from(record))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListReadingsQuery {
    #[serde(default)]
    pub skip: usize,
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListReadingsResponse {
    pub readings: Vec<ReadingResponse>,
    pub total: u64,
    pub skip: usize,
    pub limit: usize,
}

/// List readings, newest first
pub async fn list_readings(
    State(state): State<AppState>,
    Query(params): Query<ListReadingsQuery>,
) -> Result<Json<ListReadingsResponse>> {
    params.validate()?;

    let limit = params.limit.unwrap_or(MAX_PAGE_SIZE);
    let store = state.processor.store();
    let readings = store.list_readings(params.skip, limit).await?;
    let total = store.count_readings().await?;

    Ok(Json(ListReadingsResponse {
        readings: readings.into_iter().map(ReadingResponse::from).collect(),
        total,
        skip: params.skip,
        limit,
    }))
}

/// Get a reading by ID
pub async fn get_reading(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReadingResponse>> {
    let record = state
        .processor
        .store()
        .get_reading(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reading {} not found", id)))?;

    Ok(Json(ReadingResponse::from(record)))
}

#[derive(Debug, Deserialize)]
pub struct SetLabelRequest {
    pub is_leak: Option<bool>,
}

/// Set or clear the leak label of a reading
pub async fn set_label(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetLabelRequest>,
) -> Result<Json<ReadingResponse>> {
    let record = state
        .processor
        .store()
        .set_label(&id, request.is_leak)
        .await?;

    tracing::info!(reading_id = %id, is_leak = ?request.is_leak, "Reading labeled");
    Ok(Json(ReadingResponse::from(record)))
}

/// Score a reading; it is stored unlabeled and published like bus predictions
pub async fn predict(
    State(state): State<AppState>,
    Json(payload): Json<SensorPayload>,
) -> Json<PredictionResult> {
    Json(state.processor.predict_and_record(payload).await)
}

pub async fn latest_prediction(State(state): State<AppState>) -> Result<Json<PredictionResult>> {
    state
        .processor
        .ml()
        .latest_prediction()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No prediction has been made yet".to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainResponse {
    pub status: TrainTrigger,
}

/// Start a background training run
pub async fn train_model(State(state): State<AppState>) -> (StatusCode, Json<TrainResponse>) {
    let trigger = state.processor.ml().train_now();
    let status = match trigger {
        TrainTrigger::Started => StatusCode::ACCEPTED,
        TrainTrigger::AlreadyRunning => StatusCode::CONFLICT,
    };
    (status, Json(TrainResponse { status: trigger }))
}

pub async fn model_status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.processor.ml().model_status())
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
