use thiserror::Error;

use crate::features::{FeatureError, FeaturePipeline};
use crate::model::{Model, ModelError};
use crate::record::PatientRecord;

/// Probability at or above which a patient is classified as heart failure.
pub const DECISION_THRESHOLD: f64 = 0.5;

pub fn is_positive(probability: f64) -> bool {
    probability >= DECISION_THRESHOLD
}

#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl PredictError {
    pub fn is_invalid_input(&self) -> bool {
        match self {
            PredictError::Feature(e) => e.is_invalid_input(),
            PredictError::Model(ModelError::NonFinite) => true,
            PredictError::Model(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub probability: f64,
    pub heart_failure: bool,
}

impl Prediction {
    pub fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            heart_failure: is_positive(probability),
        }
    }

    /// Probability rounded to three decimals for reporting.
    pub fn rounded_probability(&self) -> f64 {
        (self.probability * 1000.0).round() / 1000.0
    }
}

/// Loaded feature pipeline and model, shared read-only across requests.
#[derive(Debug)]
pub struct Predictor {
    name: String,
    pipeline: FeaturePipeline,
    model: Model,
}

impl Predictor {
    pub fn new(name: impl Into<String>, pipeline: FeaturePipeline, model: Model) -> Self {
        Self {
            name: name.into(),
            pipeline,
            model,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn predict(&self, record: &PatientRecord) -> Result<Prediction, PredictError> {
        let row = self.pipeline.transform(record)?;
        let probability = self.model.predict_proba(&row)?;
        Ok(Prediction::from_probability(probability))
    }
}
