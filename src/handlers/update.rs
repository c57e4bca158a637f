//! POST /update: attach the true label to a stored prediction.

use std::sync::Arc;

use axum::body::Bytes;
use axum::{Extension, Json};

use admission_core::UpdateOutcome;

use crate::error::AppError;
use crate::router::AppState;

pub async fn update(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<UpdateOutcome>, AppError> {
    let payload = super::json_object(&body).map_err(|e| state.reject(e))?;
    let outcome = state
        .service
        .update(payload)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(outcome))
}
