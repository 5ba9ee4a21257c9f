//! Error types for transfer entropy estimation and preprocessing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine failed to start: {0}")]
    EngineStartup(String),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Series length mismatch: source has {source_len} samples, destination has {destination_len}")]
    LengthMismatch {
        source_len: usize,
        destination_len: usize,
    },

    #[error("Insufficient data: need {required} samples, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Unknown estimator property `{0}`")]
    UnknownProperty(String),

    #[error("Estimator used before {0}")]
    NotReady(&'static str),

    #[error("Invalid band [{low}, {high}] Hz for Nyquist frequency {nyquist} Hz")]
    InvalidBand { low: f64, high: f64, nyquist: f64 },

    #[error("Edge endpoint {index} out of range for {labels} labels")]
    EdgeIndex { index: usize, labels: usize },

    #[error("No colour given for node `{0}`")]
    MissingColor(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
