//! Classification pipeline.
//!
//! The trained model is an external artifact loaded once at startup and
//! shared read-only. [`Classifier`] is the seam the prediction service talks
//! to; [`LogisticPipeline`] is the artifact format shipped with the server: a
//! standard-scaled, one-hot logistic model serialized as JSON.
//!
//! ```json
//! {
//!   "columns": ["Age Group", "Facility Id"],
//!   "intercept": -1.2,
//!   "threshold": 0.5,
//!   "numeric": { "Facility Id": { "mean": 1100.0, "scale": 650.0, "coefficient": 0.1 } },
//!   "categorical": { "Age Group": { "70 or Older": 0.9 } }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::coerce::coerce_float;
use crate::error::AdmissionError;
use crate::schema::SchemaRegistry;
use crate::validator::ValidatedObservation;

/// One model input row: the validated observation projected onto the model's
/// feature columns. Columns the observation lacks are `null`.
pub type FeatureRow = Map<String, Value>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read pipeline artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed pipeline artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("pipeline column '{0}' is not a recognized observation field")]
    UnknownColumn(String),

    #[error("pipeline weights reference '{0}', which is not a model column")]
    UnlistedColumn(String),

    #[error("pipeline scale for '{0}' must be a positive finite number")]
    InvalidScale(String),

    #[error("pipeline threshold must lie in [0, 1], got {0}")]
    InvalidThreshold(f64),
}

/// A trained single-row classifier.
pub trait Classifier: Send + Sync {
    /// Feature columns, in the order the model was trained on.
    fn columns(&self) -> &[String];

    /// Predicted integer label for one row.
    fn predict(&self, row: &FeatureRow) -> Result<i64, AdmissionError>;
}

/// Project a validated observation onto `columns`.
pub fn project_row(columns: &[String], observation: &ValidatedObservation) -> FeatureRow {
    columns
        .iter()
        .map(|c| (c.clone(), observation.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn default_threshold() -> f64 {
    0.5
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericWeight {
    pub mean: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub coefficient: f64,
}

/// Serialized form of [`LogisticPipeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub columns: Vec<String>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub numeric: HashMap<String, NumericWeight>,
    #[serde(default)]
    pub categorical: HashMap<String, HashMap<String, f64>>,
}

#[derive(Debug, Clone)]
pub struct LogisticPipeline {
    artifact: PipelineArtifact,
}

impl LogisticPipeline {
    /// Load and check an artifact against the schema.
    pub fn load(path: impl AsRef<Path>, schema: &SchemaRegistry) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: PipelineArtifact = serde_json::from_slice(&bytes)?;
        let pipeline = Self::from_artifact(artifact, schema)?;
        info!(
            path = %path.display(),
            columns = pipeline.artifact.columns.len(),
            "loaded classification pipeline"
        );
        Ok(pipeline)
    }

    pub fn from_artifact(
        artifact: PipelineArtifact,
        schema: &SchemaRegistry,
    ) -> Result<Self, PipelineError> {
        if let Some(unknown) = artifact.columns.iter().find(|c| !schema.is_recognized(c)) {
            return Err(PipelineError::UnknownColumn(unknown.clone()));
        }
        let weighted = artifact
            .numeric
            .keys()
            .chain(artifact.categorical.keys());
        for column in weighted {
            if !artifact.columns.contains(column) {
                return Err(PipelineError::UnlistedColumn(column.clone()));
            }
        }
        for (column, weight) in &artifact.numeric {
            if !(weight.scale.is_finite() && weight.scale > 0.0) {
                return Err(PipelineError::InvalidScale(column.clone()));
            }
        }
        if !(0.0..=1.0).contains(&artifact.threshold) {
            return Err(PipelineError::InvalidThreshold(artifact.threshold));
        }
        Ok(Self { artifact })
    }

    /// Positive-class probability for one row.
    pub fn predict_proba(&self, row: &FeatureRow) -> Result<f64, AdmissionError> {
        let score = self.decision_score(row);
        if !score.is_finite() {
            return Err(AdmissionError::Model(format!(
                "non-finite decision score {score}"
            )));
        }
        Ok(1.0 / (1.0 + (-score).exp()))
    }

    /// Linear score, summed in column order so the result is reproducible
    /// across processes.
    fn decision_score(&self, row: &FeatureRow) -> f64 {
        let mut score = self.artifact.intercept;

        for column in &self.artifact.columns {
            let value = row.get(column);

            if let Some(weight) = self.artifact.numeric.get(column) {
                // Absent values impute the training mean, contributing nothing.
                if let Some(x) = value.and_then(coerce_float) {
                    score += (x - weight.mean) / weight.scale * weight.coefficient;
                }
            }

            if let Some(levels) = self.artifact.categorical.get(column) {
                let level = match value {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                };
                if let Some(weight) = level.and_then(|l| levels.get(&l)) {
                    score += weight;
                }
            }
        }

        score
    }
}

impl Classifier for LogisticPipeline {
    fn columns(&self) -> &[String] {
        &self.artifact.columns
    }

    fn predict(&self, row: &FeatureRow) -> Result<i64, AdmissionError> {
        let proba = self.predict_proba(row)?;
        Ok(i64::from(proba >= self.artifact.threshold))
    }
}
