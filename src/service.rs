//! Prediction service state and operations.
//!
//! A service is built once at startup, either Ready (artifact held) or Unloaded
//! (degraded). It never changes state afterwards, so handlers share it read-only.

use std::path::Path;
use thiserror::Error;

use crate::model::{InferenceError, ModelArtifact};
use crate::types::{
    BatchItem, BatchPredictRequest, BatchPredictResponse, Health, PredictRequest, PredictResponse,
    MIN_WAIT_MINUTES,
};

#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    #[error("Model not loaded. Train the model first.")]
    ModelNotLoaded,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("inference failed: {0}")]
    InferenceFailure(String),
}

impl From<InferenceError> for PredictError {
    fn from(e: InferenceError) -> Self {
        PredictError::InferenceFailure(e.to_string())
    }
}

pub struct PredictionService {
    model: Option<ModelArtifact>,
}

impl PredictionService {
    pub fn ready(model: ModelArtifact) -> Self {
        Self { model: Some(model) }
    }

    pub fn unloaded() -> Self {
        Self { model: None }
    }

    /// Single load attempt. Failure leaves the service Unloaded for good and is only logged.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match ModelArtifact::load(path) {
            Ok(m) => {
                tracing::info!(
                    "model loaded from {} ({} trees, depth<={})",
                    path.display(),
                    m.forest().n_trees(),
                    m.forest().max_tree_depth()
                );
                Self::ready(m)
            }
            Err(e) => {
                tracing::warn!("model not available ({e}); serving in degraded mode, run the trainer first");
                Self::unloaded()
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn health(&self) -> Health {
        Health { status: "ok".to_string(), model_loaded: self.is_ready() }
    }

    pub fn model(&self) -> Result<&ModelArtifact, PredictError> {
        self.model.as_ref().ok_or(PredictError::ModelNotLoaded)
    }

    pub fn predict(&self, req: &PredictRequest) -> Result<PredictResponse, PredictError> {
        let model = self.model()?;
        let fv = req.to_features();
        let raw = model.predict(&fv)?;
        Ok(PredictResponse {
            predicted_wait_minutes: to_wait_minutes(raw),
            stop_id: fv.stop_id,
            day_of_week: fv.day_of_week,
            hour_of_day: fv.hour_of_day,
        })
    }

    /// Same defaulting and post-processing as `predict`, item by item, in input order.
    /// Any failing item fails the whole batch.
    pub fn batch_predict(&self, req: &BatchPredictRequest) -> Result<BatchPredictResponse, PredictError> {
        let model = self.model()?;
        let fvs: Vec<_> = req.predictions.iter().map(PredictRequest::to_features).collect();
        let raw = model.predict_batch(&fvs)?;
        let predictions = fvs
            .iter()
            .zip(raw)
            .map(|(fv, y)| BatchItem { stop_id: fv.stop_id, predicted_wait_minutes: to_wait_minutes(y) })
            .collect();
        Ok(BatchPredictResponse { predictions })
    }
}

/// Nearest whole minute (ties to even), never below the floor.
pub fn to_wait_minutes(raw: f64) -> i64 {
    (raw.round_ties_even() as i64).max(MIN_WAIT_MINUTES as i64)
}
