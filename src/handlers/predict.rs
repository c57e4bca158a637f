//! POST /predict: validate an observation, classify it and record the result.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Serialize;

use crate::error::{status_for, AppError};
use crate::router::AppState;

#[derive(Debug, Serialize)]
struct PredictResponse {
    observation_id: String,
    prediction: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn predict(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let raw = super::json_object(&body).map_err(|e| state.reject(e))?;
    let outcome = state
        .service
        .predict(raw)
        .await
        .map_err(|e| state.reject(e))?;

    // The label is returned even when the record could not be created.
    let status = outcome
        .store_error
        .as_ref()
        .map(|e| status_for(e, state.strict_status))
        .unwrap_or(StatusCode::OK);
    let body = PredictResponse {
        error: outcome.store_error.as_ref().map(ToString::to_string),
        observation_id: outcome.observation_id,
        prediction: outcome.prediction,
    };
    Ok((status, Json(body)).into_response())
}
