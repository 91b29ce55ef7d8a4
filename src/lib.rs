//! Gas leak monitor
//!
//! Ingests multi-sensor gas telemetry from a message bus and an HTTP API,
//! stores readings for operator labeling, trains a leak classifier on the
//! labeled history and serves SAFE / WARNING / DANGER predictions.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod messaging;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod state;

pub use error::{AppError, Result};
