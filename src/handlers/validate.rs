//! POST /validate: report every validation failure without predicting or storing.

use std::sync::Arc;

use axum::body::Bytes;
use axum::{Extension, Json};
use serde::Serialize;

use crate::error::AppError;
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub observation_id: Option<String>,
    pub valid: bool,
    pub errors: Vec<String>,
}

pub async fn validate(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ValidateResponse>, AppError> {
    let raw = super::json_object(&body).map_err(|e| state.reject(e))?;
    let report = state.service.dry_run(raw);
    Ok(Json(ValidateResponse {
        valid: report.is_valid(),
        errors: report.messages(),
        observation_id: report.observation_id,
    }))
}
