//! HTTP surface: `POST /predict` scores one patient record, `GET /health`
//! reports the loaded model.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::predictor::{PredictError, Prediction, Predictor};
use crate::record::PatientRecord;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    pub heart_failure_probability: f64,
    pub heart_failure: bool,
}

impl From<Prediction> for PredictionResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            heart_failure_probability: prediction.rounded_probability(),
            heart_failure: prediction.heart_failure,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request body: {}", .0.body_text())]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Predict(#[from] PredictError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::Predict(e) if e.is_invalid_input() => StatusCode::BAD_REQUEST,
            ApiError::Predict(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Prediction failed: {}", self);
        } else {
            log::warn!("Rejected request: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(predictor: Arc<Predictor>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .with_state(predictor)
}

pub async fn serve(cfg: &ServiceConfig, predictor: Predictor) -> Result<()> {
    let listener = TcpListener::bind(&cfg.bind_addr).await?;
    log::info!(
        "Serving model '{}' on http://{}",
        predictor.name(),
        listener.local_addr()?
    );
    axum::serve(listener, router(Arc::new(predictor)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Cannot listen for shutdown signal: {}", e);
        return;
    }
    log::info!("Shutdown signal received");
}

async fn predict(
    State(predictor): State<Arc<Predictor>>,
    payload: Result<Json<PatientRecord>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(record) = payload?;
    let prediction = predictor.predict(&record)?;
    log::debug!(
        "Scored patient: probability {:.6}, heart failure {}",
        prediction.probability,
        prediction.heart_failure
    );
    Ok(Json(prediction.into()))
}

async fn health(State(predictor): State<Arc<Predictor>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: predictor.name().to_string(),
        kind: predictor.model().kind().to_string(),
    })
}
