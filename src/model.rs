use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};
use thiserror::Error;

use crate::forest::RandomForest;
use crate::types::{FeatureVector, FEATURE_NAMES, N_FEATURES};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact io at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("artifact at {path} is not valid JSON: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact shape mismatch: {0}")]
    Shape(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("model expects {expected} features, contract has {got}")]
    FeatureWidth { expected: usize, got: usize },
    #[error("model produced a non-finite prediction ({0})")]
    NonFinite(f64),
}

/// Fitted waiting-time regressor plus the metadata needed to check it on load.
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    feat_list: Vec<String>, // authoritative input order
    seed: u64,
    forest: RandomForest,
}

impl ModelArtifact {
    pub fn new(forest: RandomForest, seed: u64) -> Self {
        Self {
            feat_list: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            seed,
            forest,
        }
    }

    pub fn feat_list(&self) -> &[String] {
        &self.feat_list
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Raw regression output in minutes, before rounding or clamping.
    pub fn predict(&self, fv: &FeatureVector) -> Result<f64, InferenceError> {
        let width = self.forest.n_features();
        if width != N_FEATURES {
            return Err(InferenceError::FeatureWidth { expected: width, got: N_FEATURES });
        }
        let y = self.forest.predict(&fv.to_row());
        if !y.is_finite() {
            return Err(InferenceError::NonFinite(y));
        }
        Ok(y)
    }

    /// Vectorized form; fails as a whole if any row fails.
    pub fn predict_batch(&self, fvs: &[FeatureVector]) -> Result<Vec<f64>, InferenceError> {
        fvs.iter().map(|fv| self.predict(fv)).collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ArtifactError::Io { path: shown.clone(), source })?;
        }
        let body = serde_json::to_vec(self)
            .map_err(|source| ArtifactError::Format { path: shown.clone(), source })?;
        fs::write(path, body).map_err(|source| ArtifactError::Io { path: shown, source })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let txt = fs::read_to_string(path).map_err(|source| ArtifactError::Io { path: shown.clone(), source })?;
        let model: Self =
            serde_json::from_str(&txt).map_err(|source| ArtifactError::Format { path: shown, source })?;

        if model.feat_list.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
            return Err(ArtifactError::Shape(format!(
                "feat_list {:?} does not match {:?}",
                model.feat_list, FEATURE_NAMES
            )));
        }
        if model.forest.n_features() != N_FEATURES {
            return Err(ArtifactError::Shape(format!(
                "forest width {} != {}",
                model.forest.n_features(),
                N_FEATURES
            )));
        }
        model.forest.check().map_err(ArtifactError::Shape)?;
        Ok(model)
    }
}
