use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One aggregation window reported by the sensor fleet.
///
/// Every field is optional on the wire. Up to three gas-sensor workers report
/// a summary (mean, min, max, variance) of their raw samples over the window;
/// the environment sensor reports humidity and temperature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default)]
    pub worker_1_mean: Option<f64>,
    #[serde(default)]
    pub worker_1_min: Option<f64>,
    #[serde(default)]
    pub worker_1_max: Option<f64>,
    #[serde(default)]
    pub worker_1_var: Option<f64>,

    #[serde(default)]
    pub worker_2_mean: Option<f64>,
    #[serde(default)]
    pub worker_2_min: Option<f64>,
    #[serde(default)]
    pub worker_2_max: Option<f64>,
    #[serde(default)]
    pub worker_2_var: Option<f64>,

    #[serde(default)]
    pub worker_3_mean: Option<f64>,
    #[serde(default)]
    pub worker_3_min: Option<f64>,
    #[serde(default)]
    pub worker_3_max: Option<f64>,
    #[serde(default)]
    pub worker_3_var: Option<f64>,

    /// Relative humidity (%)
    #[serde(default)]
    pub humidity: Option<f64>,

    /// Temperature (°C)
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl Reading {
    /// Worker means in worker order, absent values preserved
    pub fn worker_means(&self) -> [Option<f64>; 3] {
        [self.worker_1_mean, self.worker_2_mean, self.worker_3_mean]
    }
}

/// Inbound payload on the data / predict topics and the HTTP ingest endpoint.
///
/// The reading fields sit at the top level of the JSON object. `timestamp`
/// defaults to the ingestion time. `is_leak` accepts a boolean or 0/1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorPayload {
    #[serde(flatten)]
    pub reading: Reading,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "deserialize_label")]
    pub is_leak: Option<bool>,
}

impl SensorPayload {
    pub fn new(reading: Reading) -> Self {
        Self {
            reading,
            timestamp: None,
            is_leak: None,
        }
    }

    pub fn with_label(mut self, is_leak: bool) -> Self {
        self.is_leak = Some(is_leak);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Turn the payload into a persisted record
    pub fn into_record(self) -> SensorRecord {
        SensorRecord {
            id: Uuid::new_v4(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            reading: self.reading,
            is_leak: self.is_leak,
        }
    }
}

/// Persisted reading row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    /// Unique identifier
    pub id: Uuid,

    /// Window timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    /// Sensor values
    pub reading: Reading,

    /// Operator label, absent until someone labels the row
    pub is_leak: Option<bool>,
}

impl SensorRecord {
    pub fn new(reading: Reading) -> Self {
        SensorPayload::new(reading).into_record()
    }

    /// Labeled view of this record, if it has been labeled
    pub fn labeled_sample(&self) -> Option<LabeledSample> {
        self.is_leak.map(|is_leak| LabeledSample {
            id: self.id,
            timestamp: self.timestamp,
            reading: self.reading.clone(),
            is_leak,
        })
    }
}

/// A reading an operator has labeled; the only input the trainer accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub reading: Reading,
    pub is_leak: bool,
}

impl LabeledSample {
    /// Label as a class index: 1 = leak, 0 = no leak
    pub fn label(&self) -> i32 {
        i32::from(self.is_leak)
    }
}

/// Accepts `true`/`false`, `0`/`1` or `null`
fn deserialize_label<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b)),
        Some(serde_json::Value::Number(n)) => match n.as_f64() {
            Some(v) if v == 0.0 => Ok(Some(false)),
            Some(v) if v == 1.0 => Ok(Some(true)),
            _ => Err(D::Error::custom(format!("is_leak must be 0 or 1, got {}", n))),
        },
        Some(other) => Err(D::Error::custom(format!(
            "is_leak must be a boolean or 0/1, got {}",
            other
        ))),
    }
}
