//! On-disk model artifact.
//!
//! A single file, replaced wholesale: the new model is written to a sibling
//! temp file, synced, then renamed over the old one.

use crate::ml::classifier::TrainedModel;
use crate::ml::error::MlError;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Whether an artifact exists, without reading it
pub fn model_available(path: &Path) -> bool {
    path.is_file()
}

/// Atomically replace the artifact at `path` with `model`
pub fn save(model: &TrainedModel, path: &Path) -> Result<(), MlError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let result = write_file(model, &tmp).and_then(|_| {
        fs::rename(&tmp, path)?;
        Ok(())
    });

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;

    info!(path = %path.display(), "Model artifact written");
    Ok(())
}

fn write_file(model: &TrainedModel, path: &Path) -> Result<(), MlError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, model)
        .map_err(|e| MlError::Training(format!("failed to serialize model: {}", e)))?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| MlError::Io(e.into_error()))?
        .sync_all()?;
    Ok(())
}

/// Read and validate the artifact at `path`
pub fn load(path: &Path) -> Result<TrainedModel, MlError> {
    let bytes = fs::read(path)?;
    let model: TrainedModel = bincode::deserialize(&bytes)
        .map_err(|e| MlError::ModelArtifactCorrupt(e.to_string()))?;
    model.validate()?;

    debug!(path = %path.display(), "Model artifact loaded");
    Ok(model)
}
