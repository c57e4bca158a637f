//! HTTP mapping for domain errors.
//!
//! Every anticipated failure becomes `{"observation_id": <id-or-null>, "error": <message>}`.
//! The status is 200 unless the server runs in strict mode, in which case it
//! comes from `AdmissionError::http_status`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use admission_core::{AdmissionError, ObservationError};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub observation_id: Option<String>,
    pub error: String,
}

#[derive(Debug)]
pub struct AppError {
    pub inner: ObservationError,
    pub strict_status: bool,
}

impl AppError {
    pub fn new(inner: ObservationError, strict_status: bool) -> Self {
        Self {
            inner,
            strict_status,
        }
    }

    pub fn status(&self) -> StatusCode {
        status_for(&self.inner.error, self.strict_status)
    }
}

/// 200 in reference mode, the error's own status in strict mode.
pub fn status_for(error: &AdmissionError, strict_status: bool) -> StatusCode {
    if !strict_status {
        return StatusCode::OK;
    }
    StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            observation_id: self.inner.observation_id,
            error: self.inner.error.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
