use thiserror::Error;

/// Every anticipated failure of the predict/update pipeline.
///
/// The `Display` text is the message returned to callers verbatim.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Observation has no ID.")]
    MissingId,

    #[error("Observation ID must be a string.")]
    InvalidObservationId,

    #[error("Request body must be a JSON object.")]
    MalformedBody,

    #[error("{0} is not a valid feature.")]
    UnrecognizedField(String),

    #[error("{0} is missing.")]
    MissingMandatoryField(String),

    #[error("Invalid value provided for {field}: {value}. Allowed values are: {allowed}")]
    InvalidCategoricalValue {
        field: String,
        value: String,
        allowed: String,
    },

    #[error("{0} must be a 3-digit string or 'OOS'.")]
    InvalidZipFormat(String),

    #[error("{field} must be {expected}.")]
    NumericCoercionFailure {
        field: String,
        expected: &'static str,
    },

    #[error("{field} is {reason}.")]
    NumericRangeViolation {
        field: String,
        reason: &'static str,
    },

    #[error("Observation ID: {0} already exists.")]
    DuplicateObservationId(String),

    #[error("Observation ID: {0} does not exist.")]
    UnknownObservationId(String),

    #[error("{0} is not a valid update field.")]
    UnexpectedUpdateField(String),

    #[error("true_value is missing.")]
    MissingTrueValue,

    #[error("True value must be an integer.")]
    TrueValueNotInteger,

    #[error("Observation ID: {0} already has a true value.")]
    AlreadyLabeled(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl AdmissionError {
    /// Status used when the server runs with differentiated status codes.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnknownObservationId(_) => 404,
            Self::DuplicateObservationId(_) | Self::AlreadyLabeled(_) => 409,
            Self::Model(_) | Self::Store(_) => 500,
            _ => 400,
        }
    }
}

pub type Result<T> = std::result::Result<T, AdmissionError>;

/// A failed request, tagged with the caller's observation id when one was
/// supplied.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ObservationError {
    pub observation_id: Option<String>,
    pub error: AdmissionError,
}

impl ObservationError {
    pub fn new(observation_id: impl Into<String>, error: AdmissionError) -> Self {
        Self {
            observation_id: Some(observation_id.into()),
            error,
        }
    }

    /// Failure raised before an id could be extracted.
    pub fn anonymous(error: AdmissionError) -> Self {
        Self {
            observation_id: None,
            error,
        }
    }
}
