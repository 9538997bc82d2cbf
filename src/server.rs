use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::service::{PredictError, PredictionService};
use crate::types::{BatchPredictRequest, BatchPredictResponse, Health, PredictRequest, PredictResponse};

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<PredictionService>,
}

// ---------- Error mapping ----------

pub struct ApiError(PredictError);

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError(PredictError::InvalidInput(r.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            PredictError::ModelNotLoaded => StatusCode::INTERNAL_SERVER_ERROR,
            PredictError::InvalidInput(_) | PredictError::InferenceFailure(_) => StatusCode::BAD_REQUEST,
        };
        if status.is_server_error() {
            tracing::error!("{}", self.0);
        } else {
            tracing::debug!("rejected request: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ---------- Handlers ----------

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(state.svc.health())
}

// Readiness is checked before the body so an unloaded service answers 500 even for bad input.
async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    state.svc.model()?;
    let Json(req) = payload?;
    Ok(Json(state.svc.predict(&req)?))
}

async fn batch_predict(
    State(state): State<AppState>,
    payload: Result<Json<BatchPredictRequest>, JsonRejection>,
) -> Result<Json<BatchPredictResponse>, ApiError> {
    state.svc.model()?;
    let Json(req) = payload?;
    Ok(Json(state.svc.batch_predict(&req)?))
}

pub fn router(svc: Arc<PredictionService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/batch_predict", post(batch_predict))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { svc })
}
