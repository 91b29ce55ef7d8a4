//! Bus ingestion end to end over the in-memory backend

mod common;

use common::{leak_reading, seed_store};
use gas_leak_monitor::{
    ingest::{build_router, PredictionEvent, ReadingProcessor},
    messaging::{
        MessagingConfig, MessagingService, DATA_TOPIC, PREDICTION_TOPIC, PREDICT_TOPIC,
        TRAIN_TOPIC,
    },
    metrics::INGEST_MALFORMED_TOTAL,
    ml::{LeakStatus, MLConfig, MlService, PredictionSource},
    state::{create_in_memory_store, ReadingStore},
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    messaging: Arc<MessagingService>,
    processor: ReadingProcessor,
    _dir: TempDir,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let store = create_in_memory_store();
    let ml = MlService::new(
        MLConfig {
            artifact_path: dir.path().join("model.bin"),
            n_trees: 15,
            ..Default::default()
        },
        store.clone(),
    );
    let messaging = Arc::new(
        MessagingService::new(MessagingConfig::in_memory())
            .await
            .unwrap(),
    );
    let processor = ReadingProcessor::new(store, ml).with_messaging(messaging.clone());

    Harness {
        messaging,
        processor,
        _dir: dir,
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

async fn wait_for_count(store: &dyn ReadingStore, expected: u64) {
    for _ in 0..200 {
        if store.count_readings().await.unwrap() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn test_data_topic_persists_labeled_reading() {
    let h = harness().await;
    let subscriptions = build_router(&h.processor).start(&h.messaging).await.unwrap();

    h.messaging
        .publish(
            DATA_TOPIC,
            &serde_json::json!({
                "worker_1_mean": 512.0,
                "worker_2_mean": 498.5,
                "humidity": 41.0,
                "is_leak": 0
            }),
        )
        .await
        .unwrap();

    let store = h.processor.store().clone();
    wait_for_count(store.as_ref(), 1).await;

    let rows = store.list_readings(0, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].is_leak, Some(false));
    assert_eq!(rows[0].reading.worker_2_mean, Some(498.5));
    assert!(rows[0].reading.worker_3_mean.is_none());

    subscriptions.shutdown();
}

#[tokio::test]
async fn test_malformed_message_is_dropped() {
    let h = harness().await;
    let subscriptions = build_router(&h.processor).start(&h.messaging).await.unwrap();
    let malformed = INGEST_MALFORMED_TOTAL.with_label_values(&["sensors.data"]);
    let before = malformed.get();

    h.messaging
        .publish_bytes(DATA_TOPIC, b"{not json".to_vec())
        .await
        .unwrap();
    // A valid message afterwards proves the subscription survived
    h.messaging
        .publish(DATA_TOPIC, &serde_json::json!({ "worker_1_mean": 100.0 }))
        .await
        .unwrap();

    let store = h.processor.store().clone();
    wait_for_count(store.as_ref(), 1).await;

    assert_eq!(store.count_readings().await.unwrap(), 1);
    assert!(malformed.get() > before);

    subscriptions.shutdown();
}

#[tokio::test]
async fn test_predict_topic_publishes_prediction() {
    let h = harness().await;
    let mut predictions = h.messaging.subscribe(PREDICTION_TOPIC).await.unwrap();
    let subscriptions = build_router(&h.processor).start(&h.messaging).await.unwrap();

    h.messaging
        .publish(PREDICT_TOPIC, &leak_reading(0))
        .await
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(5), predictions.next())
        .await
        .unwrap()
        .unwrap();
    let event: PredictionEvent = serde_json::from_slice(&message.payload).unwrap();

    assert_eq!(event.prediction.status, LeakStatus::Danger);
    assert_eq!(event.prediction.source, PredictionSource::Placeholder);
    assert_eq!(h.processor.ml().latest_prediction(), Some(event.prediction));

    let stored = h
        .processor
        .store()
        .get_reading(&event.reading_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_leak.is_none());

    subscriptions.shutdown();
}

#[tokio::test]
async fn test_train_topic_starts_training() {
    let h = harness().await;
    seed_store(h.processor.store().as_ref(), 40).await;
    let subscriptions = build_router(&h.processor).start(&h.messaging).await.unwrap();

    h.messaging
        .publish_bytes(TRAIN_TOPIC, b"go".to_vec())
        .await
        .unwrap();

    let ml = h.processor.ml().clone();
    wait_for(|| ml.model_status().last_run.is_some()).await;

    let status = ml.model_status();
    assert!(status.last_run.unwrap().succeeded());
    assert!(status.model_available);

    subscriptions.shutdown();
}
