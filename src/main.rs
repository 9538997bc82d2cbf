use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use stop_wait::{config::ServeConfig, server, PredictionService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServeConfig::from_env();

    // One load attempt; a missing or broken artifact leaves /health up in degraded mode.
    let svc = Arc::new(PredictionService::load(&cfg.model_path));
    let app = server::router(svc);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
