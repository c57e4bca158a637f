//! Hospital admission risk classification: domain core.
//!
//! Pure domain logic with no HTTP or SQL dependencies:
//!
//! - [`schema`]: the registry of recognized observation fields
//! - [`validator`]: the four-stage observation validator
//! - [`pipeline`]: the classifier seam and the logistic artifact loader
//! - [`store`]: the record store port and an in-memory implementation
//! - [`service`]: prediction and update services

pub mod coerce;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod service;
pub mod store;
pub mod validator;

pub use error::{AdmissionError, ObservationError};
pub use pipeline::{Classifier, FeatureRow, LogisticPipeline, PipelineArtifact, PipelineError};
pub use schema::{FieldKind, FieldSpec, NumericKind, NumericRange, SchemaRegistry};
pub use service::{AdmissionService, PredictionOutcome, UpdateOutcome, UpdateRequest};
pub use store::{
    InMemoryPredictionStore, LabelOutcome, NewPrediction, PredictionRecord, PredictionStore,
    RelabelPolicy,
};
pub use validator::{RawObservation, ValidatedObservation, ValidationReport, Validator};
