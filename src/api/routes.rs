use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::welcome))
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        .route("/health/ready", get(handlers::readiness_check))
        // Readings
        .route(
            "/v1/readings",
            post(handlers::create_reading).get(handlers::list_readings),
        )
        .route("/v1/readings/:id", get(handlers::get_reading))
        .route("/v1/readings/:id/label", put(handlers::set_label))
        // Predictions
        .route("/v1/predict", post(handlers::predict))
        .route("/v1/predictions/latest", get(handlers::latest_prediction))
        // Model lifecycle
        .route("/v1/model/train", post(handlers::train_model))
        .route("/v1/model/status", get(handlers::model_status))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
