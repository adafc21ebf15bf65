//! Fitted artifacts on disk.
//!
//! The trainer writes four bincode files into one directory: the encoder,
//! scaler and vectorizer under fixed names, and one `<model name>.bin` per
//! selected model. The service loads them once before it starts listening.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::features::{CategoricalEncoder, FeaturePipeline, FeatureVectorizer, MinMaxScaler};
use crate::model::Model;
use crate::predictor::Predictor;
use crate::record::{CATEGORICAL_COLUMNS, COLUMNS};

pub const ENCODER_FILE: &str = "encoder.bin";
pub const SCALER_FILE: &str = "scaler.bin";
pub const VECTORIZER_FILE: &str = "dv.bin";
pub const MODEL_EXTENSION: &str = "bin";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot access artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact {path} is not a valid encoding: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("inconsistent artifacts: {0}")]
    Inconsistent(String),
}

pub fn model_path(dir: &Path, model_name: &str) -> PathBuf {
    dir.join(format!("{model_name}.{MODEL_EXTENSION}"))
}

fn write_bin<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let data = bincode::serialize(value).map_err(|source| ArtifactError::Codec {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, data).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_bin<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize(&bytes).map_err(|source| ArtifactError::Codec {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_pipeline(dir: &Path, pipeline: &FeaturePipeline) -> Result<(), ArtifactError> {
    write_bin(&dir.join(ENCODER_FILE), &pipeline.encoder)?;
    write_bin(&dir.join(SCALER_FILE), &pipeline.scaler)?;
    write_bin(&dir.join(VECTORIZER_FILE), &pipeline.vectorizer)
}

pub fn save_model(dir: &Path, model_name: &str, model: &Model) -> Result<PathBuf, ArtifactError> {
    let path = model_path(dir, model_name);
    write_bin(&path, model)?;
    Ok(path)
}

pub fn load_pipeline(dir: &Path) -> Result<FeaturePipeline, ArtifactError> {
    let encoder: CategoricalEncoder = read_bin(&dir.join(ENCODER_FILE))?;
    let scaler: MinMaxScaler = read_bin(&dir.join(SCALER_FILE))?;
    let vectorizer: FeatureVectorizer = read_bin(&dir.join(VECTORIZER_FILE))?;
    Ok(FeaturePipeline::new(encoder, scaler, vectorizer))
}

/// Loads the pipeline and the named model, refusing a set that could not
/// score a record.
pub fn load(dir: &Path, model_name: &str) -> Result<Predictor, ArtifactError> {
    let pipeline = load_pipeline(dir)?;
    let path = model_path(dir, model_name);
    let model: Model = read_bin(&path)?;
    check_consistency(&pipeline, &model)?;
    log::info!(
        "Loaded {} model '{}' from {} ({} features)",
        model.kind(),
        model_name,
        path.display(),
        model.n_features()
    );
    Ok(Predictor::new(model_name, pipeline, model))
}

fn check_consistency(pipeline: &FeaturePipeline, model: &Model) -> Result<(), ArtifactError> {
    if let Some(column) = CATEGORICAL_COLUMNS
        .iter()
        .find(|column| pipeline.encoder.classes(column).map_or(true, <[String]>::is_empty))
    {
        return Err(ArtifactError::Inconsistent(format!(
            "encoder has no labels for {column}"
        )));
    }
    if pipeline.scaler.n_columns() != COLUMNS.len() {
        return Err(ArtifactError::Inconsistent(format!(
            "scaler fitted on {} columns, records have {}",
            pipeline.scaler.n_columns(),
            COLUMNS.len()
        )));
    }
    if pipeline.vectorizer.is_empty() {
        return Err(ArtifactError::Inconsistent("vectorizer has no features".to_string()));
    }
    if pipeline.vectorizer.len() != model.n_features() {
        return Err(ArtifactError::Inconsistent(format!(
            "vectorizer yields {} features, model expects {}",
            pipeline.vectorizer.len(),
            model.n_features()
        )));
    }
    Ok(())
}
