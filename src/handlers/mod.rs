pub mod health;
pub mod observations;
pub mod predict;
pub mod update;
pub mod validate;

use axum::body::Bytes;
use serde_json::{Map, Value};

use admission_core::service::require_object;
use admission_core::{AdmissionError, ObservationError};

/// Parse a request body that must be a JSON object. Handlers take raw bytes
/// so malformed bodies still get a structured error instead of an extractor
/// rejection.
pub(crate) fn json_object(body: &Bytes) -> Result<Map<String, Value>, ObservationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| ObservationError::anonymous(AdmissionError::MalformedBody))?;
    require_object(value)
}
