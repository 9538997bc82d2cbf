use serde::Deserialize;
use std::{fs, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Offline pipeline settings. Hyperparameters are fixed here, never learned.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    pub n_samples: usize,
    pub test_fraction: f64,
    pub seed: u64,
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub model_path: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            n_samples: 2000,
            test_fraction: 0.2,
            seed: 42,
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            model_path: PathBuf::from("model.json"),
        }
    }
}

impl TrainConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let cfg: Self = serde_json::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Defaults, then `TRAIN_CONFIG` file, then `MODEL_PATH` / `SEED` overrides.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = match lookup("TRAIN_CONFIG") {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        if let Some(p) = lookup("MODEL_PATH") {
            cfg.model_path = PathBuf::from(p);
        }
        if let Some(s) = lookup("SEED") {
            cfg.seed = s.parse().map_err(|_| ConfigError::Invalid {
                field: "seed",
                reason: format!("{s:?} is not an unsigned integer"),
            })?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_samples < 2 {
            return Err(ConfigError::Invalid {
                field: "n_samples",
                reason: format!("need at least 2 samples, got {}", self.n_samples),
            });
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::Invalid {
                field: "test_fraction",
                reason: format!("must lie in (0, 1), got {}", self.test_fraction),
            });
        }
        if self.n_trees == 0 {
            return Err(ConfigError::Invalid { field: "n_trees", reason: "must be positive".into() });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid { field: "max_depth", reason: "must be positive".into() });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
    pub model_path: PathBuf,
    pub port: u16,
}

impl ServeConfig {
    pub const DEFAULT_PORT: u16 = 5000;

    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let model_path = lookup("MODEL_PATH").unwrap_or_else(|| "model.json".to_string());
        let port: u16 = lookup("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::DEFAULT_PORT);
        Self { model_path: PathBuf::from(model_path), port }
    }
}
