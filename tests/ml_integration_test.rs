//! Integration tests for the leak classifier
//!
//! These tests verify the complete ML pipeline:
//! - Training gates and the held-out report
//! - Artifact persistence and reload through the service
//! - Placeholder fallback without a model or with a broken one
//! - Model swaps under concurrent predictions

mod common;

use common::{labeled_samples, leak_reading, normal_reading, seed_store};
use gas_leak_monitor::{
    ml::{
        artifact, engineer_features, forest::ForestParams, forest::RandomForest,
        scaler::StandardScaler, CancellationFlag, Classifier, LeakStatus, MLConfig, MlError,
        MlService, ModelHandle, ModelMetadata, PredictionSource, TrainTrigger, Trainer,
        TrainedModel, TrainingOutcome, FEATURE_COUNT,
    },
    models::Reading,
    state::create_in_memory_store,
};
use ndarray::Array2;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> MLConfig {
    MLConfig {
        artifact_path: dir.path().join("models").join("leak_model.bin"),
        n_trees: 25,
        max_depth: 6,
        ..Default::default()
    }
}

fn trained_model(n: usize) -> TrainedModel {
    let config = MLConfig {
        n_trees: 25,
        ..Default::default()
    };
    Trainer::new(config)
        .run(labeled_samples(n), &CancellationFlag::new())
        .unwrap()
}

#[test]
fn test_danger_reading_without_model() {
    let classifier = Classifier::new(ModelHandle::new());
    let reading = Reading {
        worker_1_mean: Some(900.0),
        worker_2_mean: Some(880.0),
        worker_3_mean: Some(910.0),
        humidity: Some(40.0),
        temperature: Some(25.0),
        ..Default::default()
    };

    let result = classifier.predict(&engineer_features(&reading));

    assert_eq!(result.status, LeakStatus::Danger);
    assert_eq!(result.probability, 0.95);
    assert_eq!(result.source, PredictionSource::Placeholder);
}

#[test]
fn test_training_gates() {
    let trainer = Trainer::new(MLConfig::default());
    let cancel = CancellationFlag::new();

    let err = trainer.run(labeled_samples(19), &cancel).unwrap_err();
    assert!(matches!(
        err,
        MlError::InsufficientData {
            found: 19,
            required: 20
        }
    ));

    let all_leaks = labeled_samples(80)
        .into_iter()
        .filter(|s| s.is_leak)
        .collect::<Vec<_>>();
    assert_eq!(all_leaks.len(), 20);
    assert!(matches!(
        trainer.run(all_leaks, &cancel),
        Err(MlError::SingleClassData)
    ));
}

#[test]
fn test_trained_model_separates_classes() {
    let model = trained_model(80);

    assert_eq!(model.metadata().n_train, 64);
    assert_eq!(model.metadata().n_test, 16);
    assert_eq!(model.metadata().n_features, FEATURE_COUNT);
    assert!(model.report().accuracy >= 0.9);

    let classifier = Classifier::new(ModelHandle::new());
    classifier.handle().replace(model);

    let danger = classifier.predict(&engineer_features(&leak_reading(1)));
    assert_eq!(danger.source, PredictionSource::Model);
    assert_eq!(danger.status, LeakStatus::Danger);

    let safe = classifier.predict(&engineer_features(&normal_reading(1)));
    assert_eq!(safe.status, LeakStatus::Safe);
}

#[test]
fn test_live_features_match_training_features() {
    let samples = labeled_samples(8);
    for sample in &samples {
        let at_training = engineer_features(&sample.reading).to_vector();
        let payload: Reading =
            serde_json::from_value(serde_json::to_value(&sample.reading).unwrap()).unwrap();
        let at_prediction = engineer_features(&payload).to_vector();
        assert_eq!(at_training, at_prediction);
    }
}

#[test]
fn test_broken_model_falls_back_to_placeholder() {
    // A model trained on a different column layout cannot score live readings
    let x = Array2::from_shape_fn((8, 2), |(i, j)| (i * 10 + j) as f64);
    let y: Vec<i32> = (0..8).map(|i| (i % 2) as i32).collect();
    let scaler = StandardScaler::fit(&x).unwrap();
    let forest = RandomForest::fit(
        &scaler.transform(&x).unwrap(),
        &y,
        ForestParams {
            n_trees: 3,
            max_depth: 3,
            min_samples_leaf: 1,
            seed: 7,
        },
        &CancellationFlag::new(),
    )
    .unwrap();
    let reference = trained_model(40);
    let broken = TrainedModel::new(
        vec!["a".to_string(), "b".to_string()],
        scaler,
        forest,
        ModelMetadata {
            n_features: 2,
            ..reference.metadata().clone()
        },
        reference.report().clone(),
    );

    let classifier = Classifier::new(ModelHandle::new());
    classifier.handle().replace(broken);

    let result = classifier.predict(&engineer_features(&leak_reading(0)));
    assert_eq!(result.source, PredictionSource::Placeholder);
    assert_eq!(result.status, LeakStatus::Danger);
}

#[test]
fn test_artifact_round_trip_scores_identically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.bin");
    let model = trained_model(40);

    artifact::save(&model, &path).unwrap();
    assert!(artifact::model_available(&path));
    let loaded = artifact::load(&path).unwrap();

    for i in 0..10 {
        let features = engineer_features(&if i % 2 == 0 {
            leak_reading(i)
        } else {
            normal_reading(i)
        });
        assert_eq!(
            model.predict_proba(&features).unwrap(),
            loaded.predict_proba(&features).unwrap()
        );
    }
}

#[tokio::test]
async fn test_service_trains_persists_and_reloads() {
    let dir = TempDir::new().unwrap();
    let store = create_in_memory_store();
    seed_store(store.as_ref(), 40).await;

    let service = MlService::new(test_config(&dir), store.clone());
    service.start().await.unwrap();
    assert!(!service.model_available());

    let run = service.train().await.unwrap();
    assert!(run.succeeded());
    assert!(service.model_available());
    assert!(service.model_status().model_loaded);

    // A fresh service picks the artifact up at startup
    let restarted = MlService::new(test_config(&dir), store);
    restarted.start().await.unwrap();
    let status = restarted.model_status();
    assert!(status.model_loaded);
    assert!(status.trained_at.is_some());

    let result = restarted.predict(&leak_reading(2));
    assert_eq!(result.source, PredictionSource::Model);
    assert_eq!(result.status, LeakStatus::Danger);
}

#[tokio::test]
async fn test_failed_run_keeps_previous_model() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let artifact_path = config.artifact_path.clone();
    let store = create_in_memory_store();
    let ids = seed_store(store.as_ref(), 40).await;
    let service = MlService::new(config, store.clone());
    service.start().await.unwrap();

    assert!(service.train().await.unwrap().succeeded());
    let artifact_before = std::fs::read(&artifact_path).unwrap();
    let trained_at = service.model_status().trained_at;
    assert!(trained_at.is_some());

    // Leave 19 labeled rows, one short of the minimum
    for id in &ids[..21] {
        store.set_label(id, None).await.unwrap();
    }

    let err = service.train().await.unwrap_err();
    assert!(matches!(
        err,
        MlError::InsufficientData {
            found: 19,
            required: 20
        }
    ));

    assert_eq!(std::fs::read(&artifact_path).unwrap(), artifact_before);
    let status = service.model_status();
    assert!(status.model_loaded);
    assert_eq!(status.trained_at, trained_at);
    match status.last_run.unwrap().outcome {
        TrainingOutcome::Failed { kind, .. } => assert_eq!(kind, "insufficient_data"),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let result = service.predict(&leak_reading(4));
    assert_eq!(result.source, PredictionSource::Model);
}

#[tokio::test]
async fn test_train_now_runs_in_background() {
    let dir = TempDir::new().unwrap();
    let store = create_in_memory_store();
    seed_store(store.as_ref(), 40).await;
    let service = MlService::new(test_config(&dir), store);

    assert_eq!(service.train_now(), TrainTrigger::Started);

    let mut waited = 0;
    while service.model_status().last_run.is_none() && waited < 300 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += 1;
    }

    let status = service.model_status();
    assert!(status.last_run.unwrap().succeeded());
    assert!(status.model_loaded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_predictions_during_model_swap() {
    let handle = ModelHandle::new();
    let classifier = Arc::new(Classifier::new(handle.clone()));
    let features = engineer_features(&leak_reading(3));

    let mut readers = Vec::new();
    for _ in 0..4 {
        let classifier = classifier.clone();
        readers.push(tokio::spawn(async move {
            let mut results = Vec::new();
            for _ in 0..200 {
                results.push(classifier.predict(&features));
                tokio::task::yield_now().await;
            }
            results
        }));
    }

    handle.replace(trained_model(40));
    handle.replace(trained_model(60));

    for reader in readers {
        for result in reader.await.unwrap() {
            // Either the placeholder or a complete model answered
            assert!((0.0..=1.0).contains(&result.probability));
            match result.source {
                PredictionSource::Placeholder => assert_eq!(result.probability, 0.95),
                PredictionSource::Model => assert_eq!(result.status, LeakStatus::Danger),
            }
        }
    }
}
