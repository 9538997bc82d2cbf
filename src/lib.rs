//! Transit stop waiting-time estimation: an offline training pipeline that fits a
//! bagged regression-tree model on synthetic data, and an HTTP prediction service
//! that serves the persisted model.

pub mod config;
pub mod dataset;
pub mod forest;
pub mod model;
pub mod server;
pub mod service;
pub mod training;
pub mod types;

pub use model::ModelArtifact;
pub use service::{PredictError, PredictionService};
