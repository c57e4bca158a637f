//! GET /observations/:id: the stored record for an observation.

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};

use admission_core::PredictionRecord;

use crate::error::AppError;
use crate::router::AppState;

pub async fn get_observation(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PredictionRecord>, AppError> {
    let record = state
        .service
        .record(&id)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(record))
}
