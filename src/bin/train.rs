use anyhow::Context;
use tracing_subscriber::EnvFilter;

use stop_wait::{config::TrainConfig, training};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = TrainConfig::from_env().context("failed to load training config")?;
    let report = training::run(&cfg)
        .with_context(|| format!("training run failed (model path {})", cfg.model_path.display()))?;

    println!("\nModel Performance:");
    println!("Mean Absolute Error: {:.2} minutes", report.metrics.mae);
    println!("R² Score: {:.3}", report.metrics.r2);
    println!("\nModel saved to: {}", report.model_path);
    Ok(())
}
