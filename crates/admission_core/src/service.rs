//! Prediction and update services.
//!
//! `AdmissionService` holds the process-wide immutable pieces (schema,
//! classifier) and the injected record store. It is constructed once at
//! startup and shared behind `Arc` by every request handler.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::coerce::coerce_integer;
use crate::error::{AdmissionError, ObservationError};
use crate::pipeline::{project_row, Classifier};
use crate::schema::SchemaRegistry;
use crate::store::{LabelOutcome, NewPrediction, PredictionRecord, PredictionStore, RelabelPolicy};
use crate::validator::{extract_observation_id, RawObservation, ValidatedObservation, ValidationReport, Validator};

pub const TRUE_VALUE: &str = "true_value";

/// Label returned by `/predict`.
///
/// `store_error` is set when the label was computed but could not be
/// recorded (duplicate id, store failure); the label is still returned.
#[derive(Debug, Serialize)]
pub struct PredictionOutcome {
    pub observation_id: String,
    pub prediction: i64,
    #[serde(skip)]
    pub store_error: Option<AdmissionError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub observation_id: String,
}

/// A parsed `/update` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub observation_id: String,
    pub true_value: i64,
}

impl UpdateRequest {
    /// Exactly `observation_id` and an integer `true_value`, nothing else.
    pub fn parse(mut payload: Map<String, Value>) -> Result<Self, ObservationError> {
        let observation_id =
            extract_observation_id(&mut payload).map_err(ObservationError::anonymous)?;
        let reject = |error| ObservationError::new(observation_id.clone(), error);

        if let Some(extra) = payload.keys().find(|k| k.as_str() != TRUE_VALUE) {
            return Err(reject(AdmissionError::UnexpectedUpdateField(extra.clone())));
        }
        let raw_value = payload
            .get(TRUE_VALUE)
            .ok_or_else(|| reject(AdmissionError::MissingTrueValue))?;
        let true_value =
            coerce_integer(raw_value).ok_or_else(|| reject(AdmissionError::TrueValueNotInteger))?;

        Ok(Self {
            observation_id,
            true_value,
        })
    }
}

pub struct AdmissionService {
    validator: Validator,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn PredictionStore>,
    relabel_policy: RelabelPolicy,
}

impl AdmissionService {
    pub fn new(
        schema: Arc<SchemaRegistry>,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn PredictionStore>,
    ) -> Self {
        Self {
            validator: Validator::new(schema),
            classifier,
            store,
            relabel_policy: RelabelPolicy::default(),
        }
    }

    pub fn with_relabel_policy(mut self, policy: RelabelPolicy) -> Self {
        self.relabel_policy = policy;
        self
    }

    /// `POST /predict`: validate, infer, record.
    pub async fn predict(&self, raw: RawObservation) -> Result<PredictionOutcome, ObservationError> {
        let observation = self.validator.validate(raw).map_err(|e| {
            warn!(
                observation_id = e.observation_id.as_deref().unwrap_or("<none>"),
                error = %e,
                "rejected observation"
            );
            e
        })?;
        self.predict_validated(observation).await
    }

    /// Infer a label for an already validated observation and try to create
    /// its record. Inference runs before the store is consulted, so a
    /// duplicate id still costs one model call.
    pub async fn predict_validated(
        &self,
        observation: ValidatedObservation,
    ) -> Result<PredictionOutcome, ObservationError> {
        let observation_id = observation.observation_id.clone();
        let row = project_row(self.classifier.columns(), &observation);
        let prediction = self.classifier.predict(&row).map_err(|e| {
            error!(observation_id = %observation_id, error = %e, "inference failed");
            ObservationError::new(observation_id.clone(), e)
        })?;

        let record = NewPrediction {
            observation_id: observation_id.clone(),
            observation: Value::Object(observation.fields),
            prediction,
        };
        let store_error = match self.store.insert_if_absent(record).await {
            Ok(true) => {
                info!(observation_id = %observation_id, prediction, "recorded prediction");
                None
            }
            Ok(false) => {
                warn!(observation_id = %observation_id, "duplicate observation id");
                Some(AdmissionError::DuplicateObservationId(observation_id.clone()))
            }
            Err(e) => {
                error!(observation_id = %observation_id, error = %e, "failed to record prediction");
                Some(e)
            }
        };

        Ok(PredictionOutcome {
            observation_id,
            prediction,
            store_error,
        })
    }

    /// `POST /update`: attach the ground-truth label to a stored prediction.
    pub async fn update(&self, payload: Map<String, Value>) -> Result<UpdateOutcome, ObservationError> {
        let request = UpdateRequest::parse(payload).map_err(|e| {
            warn!(
                observation_id = e.observation_id.as_deref().unwrap_or("<none>"),
                error = %e,
                "rejected update"
            );
            e
        })?;
        let UpdateRequest {
            observation_id,
            true_value,
        } = request;
        let fail = |error| ObservationError::new(observation_id.clone(), error);

        let outcome = self
            .store
            .set_true_value(&observation_id, true_value, self.relabel_policy)
            .await
            .map_err(|e| {
                error!(observation_id = %observation_id, error = %e, "failed to store true value");
                fail(e)
            })?;

        match outcome {
            LabelOutcome::Labeled => {
                info!(observation_id = %observation_id, true_value, "recorded true value");
                Ok(UpdateOutcome { observation_id })
            }
            LabelOutcome::NotFound => {
                warn!(observation_id = %observation_id, "update for unknown observation");
                Err(fail(AdmissionError::UnknownObservationId(observation_id.clone())))
            }
            LabelOutcome::AlreadyLabeled(existing) => {
                warn!(
                    observation_id = %observation_id,
                    existing,
                    requested = true_value,
                    "relabel rejected"
                );
                Err(fail(AdmissionError::AlreadyLabeled(observation_id.clone())))
            }
        }
    }

    /// Stored record for an observation id.
    pub async fn record(&self, observation_id: &str) -> Result<PredictionRecord, ObservationError> {
        match self.store.get(observation_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(ObservationError::new(
                observation_id,
                AdmissionError::UnknownObservationId(observation_id.to_string()),
            )),
            Err(e) => Err(ObservationError::new(observation_id, e)),
        }
    }

    /// Accumulating dry run; never predicts or stores.
    pub fn dry_run(&self, raw: RawObservation) -> ValidationReport {
        self.validator.validate_all(raw)
    }
}

/// Unwrap a JSON body that must be an object.
pub fn require_object(body: Value) -> Result<Map<String, Value>, ObservationError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ObservationError::anonymous(AdmissionError::MalformedBody)),
    }
}
