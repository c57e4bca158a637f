//! Observation validator.
//!
//! Checks an incoming `/predict` payload against the [`SchemaRegistry`] in
//! four ordered stages:
//!
//! 1. identity: extract and remove `observation_id`
//! 2. columns: every key recognized, every mandatory field present
//! 3. categorical: domain membership, zip code format
//! 4. numeric: coercion to the declared kind, inclusive range, defaults
//!
//! Each stage collects its violations in a deterministic order (map key order
//! for unrecognized keys, schema order otherwise). [`Validator::validate`]
//! stops at the first stage that reports anything and returns its first
//! violation; [`Validator::validate_all`] runs every stage and keeps them all.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::coerce::coerce;
use crate::error::{AdmissionError, ObservationError};
use crate::schema::{is_valid_zip_code, SchemaRegistry, OBSERVATION_ID};

pub type RawObservation = Map<String, Value>;

/// An observation that passed every stage.
///
/// `fields` is the submitted mapping without `observation_id`, with numeric
/// fields coerced in place and defaults filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedObservation {
    pub observation_id: String,
    pub fields: Map<String, Value>,
}

impl ValidatedObservation {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Outcome of the accumulating validator.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub observation_id: Option<String>,
    pub errors: Vec<AdmissionError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    schema: Arc<SchemaRegistry>,
}

impl Validator {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self { schema }
    }

    /// Fail-fast validation: the first violation ends the check.
    pub fn validate(
        &self,
        mut raw: RawObservation,
    ) -> Result<ValidatedObservation, ObservationError> {
        let observation_id = extract_observation_id(&mut raw).map_err(ObservationError::anonymous)?;
        let fail = |mut errors: Vec<AdmissionError>| -> Result<(), ObservationError> {
            if errors.is_empty() {
                Ok(())
            } else {
                Err(ObservationError::new(observation_id.clone(), errors.remove(0)))
            }
        };

        fail(column_violations(&self.schema, &raw))?;
        debug!(observation_id = %observation_id, "column check passed");

        fail(categorical_violations(&self.schema, &raw))?;
        debug!(observation_id = %observation_id, "categorical check passed");

        fail(normalize_numeric(&self.schema, &mut raw))?;
        debug!(observation_id = %observation_id, "numeric check passed");

        Ok(ValidatedObservation {
            observation_id,
            fields: raw,
        })
    }

    /// Accumulating validation: every stage runs and every violation is kept.
    pub fn validate_all(&self, mut raw: RawObservation) -> ValidationReport {
        let mut report = ValidationReport::default();
        match extract_observation_id(&mut raw) {
            Ok(id) => report.observation_id = Some(id),
            Err(e) => report.errors.push(e),
        }
        report
            .errors
            .extend(column_violations(&self.schema, &raw));
        report
            .errors
            .extend(categorical_violations(&self.schema, &raw));
        report
            .errors
            .extend(normalize_numeric(&self.schema, &mut raw));
        report
    }
}

/// Stage 1: remove `observation_id` from the payload and return it.
pub fn extract_observation_id(raw: &mut RawObservation) -> Result<String, AdmissionError> {
    match raw.remove(OBSERVATION_ID) {
        None | Some(Value::Null) => Err(AdmissionError::MissingId),
        Some(Value::String(id)) => Ok(id),
        Some(_) => Err(AdmissionError::InvalidObservationId),
    }
}

/// Stage 2: unrecognized keys first, then missing mandatory fields.
pub fn column_violations(schema: &SchemaRegistry, raw: &RawObservation) -> Vec<AdmissionError> {
    let unrecognized = raw
        .keys()
        .filter(|key| !schema.is_recognized(key))
        .map(|key| AdmissionError::UnrecognizedField(key.clone()));
    let missing = schema
        .mandatory_fields()
        .filter(|f| !raw.contains_key(f.name))
        .map(|f| AdmissionError::MissingMandatoryField(f.name.to_string()));
    unrecognized.chain(missing).collect()
}

/// Stage 3: categorical domains and the zip code pattern.
///
/// Absent fields are skipped (stage 2 owns presence), as are optional fields
/// sent as `null`.
pub fn categorical_violations(
    schema: &SchemaRegistry,
    raw: &RawObservation,
) -> Vec<AdmissionError> {
    let mut errors = Vec::new();

    for (field, domain) in schema.categorical_fields() {
        let Some(value) = present(raw, field.name, field.required) else {
            continue;
        };
        let in_domain = value.as_str().is_some_and(|v| domain.contains(&v));
        if !in_domain {
            errors.push(AdmissionError::InvalidCategoricalValue {
                field: field.name.to_string(),
                value: display_value(value),
                allowed: domain
                    .iter()
                    .map(|v| format!("'{v}'"))
                    .collect::<Vec<_>>()
                    .join(","),
            });
        }
    }

    for field in schema.zip_code_fields() {
        let Some(value) = present(raw, field.name, field.required) else {
            continue;
        };
        if !value.as_str().is_some_and(is_valid_zip_code) {
            errors.push(AdmissionError::InvalidZipFormat(field.name.to_string()));
        }
    }

    errors
}

/// Stage 4: coerce numeric fields in place, check ranges, fill defaults.
pub fn normalize_numeric(schema: &SchemaRegistry, raw: &mut RawObservation) -> Vec<AdmissionError> {
    let mut errors = Vec::new();

    for (field, kind, range) in schema.numeric_fields() {
        let value = match raw.get(field.name).cloned() {
            Some(Value::Null) | None if !field.required => {
                if let Some(default) = field.default {
                    raw.insert(field.name.to_string(), Value::from(default));
                }
                continue;
            }
            None => continue,
            Some(value) => value,
        };

        let Some((coerced, magnitude)) = coerce(&value, kind) else {
            errors.push(AdmissionError::NumericCoercionFailure {
                field: field.name.to_string(),
                expected: kind.expected(),
            });
            continue;
        };

        if !range.contains(magnitude) {
            errors.push(AdmissionError::NumericRangeViolation {
                field: field.name.to_string(),
                reason: range.violation_reason(),
            });
            continue;
        }

        raw.insert(field.name.to_string(), coerced);
    }

    errors
}

fn present<'a>(raw: &'a RawObservation, name: &str, required: bool) -> Option<&'a Value> {
    match raw.get(name) {
        Some(Value::Null) if !required => None,
        other => other,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
