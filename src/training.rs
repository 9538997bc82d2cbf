//! Offline pipeline: synthesize, split, fit, evaluate, persist.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::config::TrainConfig;
use crate::dataset::{generate_synthetic_dataset, split};
use crate::forest::{ForestParams, RandomForest};
use crate::model::{ArtifactError, InferenceError, ModelArtifact};
use crate::types::{TrainingSample, FEATURE_NAMES};

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid training data: {0}")]
    Data(String),
    #[error("evaluation failed: {0}")]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub mae: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub n_samples: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub metrics: Metrics,
    pub feature_importances: Vec<(String, f64)>,
    pub model_path: String,
}

pub fn fit<R: Rng + ?Sized>(
    train: &[TrainingSample],
    params: ForestParams,
    seed: u64,
    rng: &mut R,
) -> Result<ModelArtifact, TrainError> {
    let x: Vec<Vec<f64>> = train.iter().map(|s| s.features.to_row().to_vec()).collect();
    let y: Vec<f64> = train.iter().map(|s| s.waiting_time_minutes).collect();
    let forest = RandomForest::fit(&x, &y, params, rng).map_err(TrainError::Data)?;
    Ok(ModelArtifact::new(forest, seed))
}

/// MAE and R² on held-out rows. R² is 0 when the labels have no variance.
pub fn evaluate(model: &ModelArtifact, test: &[TrainingSample]) -> Result<Metrics, TrainError> {
    if test.is_empty() {
        return Err(TrainError::Data("empty test set".into()));
    }
    let fvs: Vec<_> = test.iter().map(|s| s.features).collect();
    let pred = model.predict_batch(&fvs)?;
    let truth: Vec<f64> = test.iter().map(|s| s.waiting_time_minutes).collect();
    Ok(regression_metrics(&truth, &pred))
}

pub fn regression_metrics(truth: &[f64], pred: &[f64]) -> Metrics {
    let n = truth.len() as f64;
    let mae = truth.iter().zip(pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / n;
    let mean = truth.iter().sum::<f64>() / n;
    let ss_res: f64 = truth.iter().zip(pred).map(|(t, p)| (t - p) * (t - p)).sum();
    let ss_tot: f64 = truth.iter().map(|t| (t - mean) * (t - mean)).sum();
    let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };
    Metrics { mae, r2 }
}

/// Writes the artifact, then scores it. The metrics never decide whether the model is kept.
pub fn persist_then_evaluate(
    model: &ModelArtifact,
    test: &[TrainingSample],
    path: &Path,
) -> Result<Metrics, TrainError> {
    model.save(path)?;
    tracing::info!("model saved to {}", path.display());
    evaluate(model, test)
}

/// Runs the whole pipeline from one seed. Generation, split and bootstrap draws each
/// get their own generator derived from it so changing one stage leaves the others stable.
pub fn run(cfg: &TrainConfig) -> Result<TrainingReport, TrainError> {
    cfg.validate().map_err(|e| TrainError::Data(e.to_string()))?;

    tracing::info!("generating {} synthetic samples (seed={})", cfg.n_samples, cfg.seed);
    let data = generate_synthetic_dataset(cfg.n_samples, &mut StdRng::seed_from_u64(cfg.seed));
    let (train, test) = split(&data, cfg.test_fraction, &mut StdRng::seed_from_u64(cfg.seed.wrapping_add(1)));
    drop(data);

    tracing::info!("training on {} samples, holding out {}", train.len(), test.len());
    let params = ForestParams {
        n_trees: cfg.n_trees,
        max_depth: cfg.max_depth,
        min_samples_split: cfg.min_samples_split,
    };
    let model = fit(&train, params, cfg.seed, &mut StdRng::seed_from_u64(cfg.seed.wrapping_add(2)))?;

    let metrics = persist_then_evaluate(&model, &test, &cfg.model_path)?;
    tracing::info!("mae={:.2} min r2={:.3}", metrics.mae, metrics.r2);

    let feature_importances: Vec<(String, f64)> = FEATURE_NAMES
        .iter()
        .zip(model.forest().feature_importances())
        .map(|(n, v)| (n.to_string(), *v))
        .collect();
    for (name, v) in &feature_importances {
        tracing::info!("importance {:<16} {:.3}", name, v);
    }

    Ok(TrainingReport {
        n_samples: cfg.n_samples,
        n_train: train.len(),
        n_test: test.len(),
        metrics,
        feature_importances,
        model_path: cfg.model_path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MIN_WAIT_MINUTES;

    #[test]
    fn metrics_on_perfect_and_mean_predictions() {
        let truth = [2.0, 4.0, 6.0, 8.0];
        let m = regression_metrics(&truth, &truth);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.r2, 1.0);

        let m = regression_metrics(&truth, &[5.0; 4]);
        assert_eq!(m.mae, 2.0);
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn constant_labels_give_zero_r2() {
        let m = regression_metrics(&[3.0, 3.0], &[4.0, 2.0]);
        assert_eq!(m.mae, 1.0);
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn fitted_model_beats_the_mean_and_stays_above_floor() {
        let data = generate_synthetic_dataset(1200, &mut StdRng::seed_from_u64(42));
        let (train, test) = split(&data, 0.2, &mut StdRng::seed_from_u64(43));
        let params = ForestParams { n_trees: 15, max_depth: 8, min_samples_split: 2 };
        let model = fit(&train, params, 42, &mut StdRng::seed_from_u64(44)).unwrap();
        let m = evaluate(&model, &test).unwrap();
        assert!(m.r2 > 0.3, "r2={}", m.r2);
        assert!(m.mae < 5.0, "mae={}", m.mae);

        // Leaves are means of labels that are all >= the floor.
        for s in &test {
            assert!(model.predict(&s.features).unwrap() >= MIN_WAIT_MINUTES);
        }
    }

    #[test]
    fn evaluate_rejects_empty_test_set() {
        let data = generate_synthetic_dataset(50, &mut StdRng::seed_from_u64(1));
        let params = ForestParams { n_trees: 2, max_depth: 2, min_samples_split: 2 };
        let model = fit(&data, params, 1, &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(matches!(evaluate(&model, &[]), Err(TrainError::Data(_))));
    }

    #[test]
    fn artifact_is_written_even_when_evaluation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let data = generate_synthetic_dataset(50, &mut StdRng::seed_from_u64(2));
        let params = ForestParams { n_trees: 2, max_depth: 2, min_samples_split: 2 };
        let model = fit(&data, params, 2, &mut StdRng::seed_from_u64(2)).unwrap();

        let err = persist_then_evaluate(&model, &[], &path).unwrap_err();
        assert!(matches!(err, TrainError::Data(_)));
        assert_eq!(ModelArtifact::load(&path).unwrap(), model);
    }

    #[test]
    fn run_persists_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            n_samples: 400,
            n_trees: 5,
            max_depth: 5,
            model_path: dir.path().join("model.json"),
            ..TrainConfig::default()
        };
        let report = run(&cfg).unwrap();
        assert_eq!(report.n_train + report.n_test, 400);
        assert_eq!(report.n_test, 80);
        assert_eq!(report.feature_importances.len(), 4);
        let total: f64 = report.feature_importances.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);

        let back = ModelArtifact::load(&cfg.model_path).unwrap();
        assert_eq!(back.seed(), 42);
        assert_eq!(back.forest().n_trees(), 5);
    }
}
