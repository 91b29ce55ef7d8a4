//! Shared fixtures for integration tests.
//!
//! Datasets are deterministic: leak rows read high on every worker, normal
//! rows read low, and timestamps increase one minute per row.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use gas_leak_monitor::models::{LabeledSample, Reading, SensorPayload, SensorRecord};
use gas_leak_monitor::state::ReadingStore;
use uuid::Uuid;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

pub fn leak_reading(i: usize) -> Reading {
    let jitter = (i % 7) as f64 * 5.0;
    Reading {
        worker_1_mean: Some(880.0 + jitter),
        worker_1_min: Some(800.0),
        worker_1_max: Some(950.0 + jitter),
        worker_1_var: Some(900.0),
        worker_2_mean: Some(860.0 + jitter),
        worker_2_min: Some(790.0),
        worker_2_max: Some(930.0),
        worker_2_var: Some(850.0),
        worker_3_mean: Some(905.0 - jitter),
        worker_3_min: Some(820.0),
        worker_3_max: Some(960.0),
        worker_3_var: Some(950.0),
        humidity: Some(38.0 + jitter / 5.0),
        temperature: Some(26.0),
    }
}

pub fn normal_reading(i: usize) -> Reading {
    let jitter = (i % 5) as f64 * 4.0;
    Reading {
        worker_1_mean: Some(310.0 + jitter),
        worker_1_min: Some(280.0),
        worker_1_max: Some(340.0 + jitter),
        worker_1_var: Some(120.0),
        worker_2_mean: Some(295.0 + jitter),
        worker_2_min: Some(270.0),
        worker_2_max: Some(330.0),
        worker_2_var: Some(110.0),
        worker_3_mean: Some(320.0 - jitter),
        worker_3_min: Some(290.0),
        worker_3_max: Some(350.0),
        worker_3_var: Some(130.0),
        humidity: Some(45.0 - jitter / 4.0),
        temperature: Some(22.0),
    }
}

/// Every fourth row is a leak
pub fn is_leak_row(i: usize) -> bool {
    i % 4 == 3
}

pub fn labeled_records(n: usize) -> Vec<SensorRecord> {
    (0..n)
        .map(|i| {
            let leak = is_leak_row(i);
            let reading = if leak { leak_reading(i) } else { normal_reading(i) };
            SensorPayload::new(reading)
                .with_label(leak)
                .with_timestamp(base_time() + Duration::minutes(i as i64))
                .into_record()
        })
        .collect()
}

pub fn labeled_samples(n: usize) -> Vec<LabeledSample> {
    labeled_records(n)
        .iter()
        .filter_map(SensorRecord::labeled_sample)
        .collect()
}

pub async fn seed_store(store: &dyn ReadingStore, n: usize) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(n);
    for record in labeled_records(n) {
        store.save_reading(&record).await.unwrap();
        ids.push(record.id);
    }
    ids
}
