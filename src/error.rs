//! Error taxonomy for the ingest pipeline.
//!
//! Only the fetch boundary can fail at runtime. Records the Normalizer
//! cannot translate are counted, not raised.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure, timeout or non-success HTTP status.
    #[error("network error: {0}")]
    Network(String),
    /// Body did not match the expected envelope.
    #[error("unexpected upstream format: {0}")]
    Format(String),
}

impl PipelineError {
    pub fn is_network(&self) -> bool {
        matches!(self, PipelineError::Network(_))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PipelineError::Network(format!("request timed out: {e}"))
        } else if let Some(status) = e.status() {
            PipelineError::Network(format!("upstream returned HTTP {status}"))
        } else {
            PipelineError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FilterSpecError {
    #[error("min_magnitude must be a finite number >= 0 (got {0})")]
    InvalidMinMagnitude(f64),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer: {0}")]
    Buffer(String),
    #[error("row {row}: invalid {field} value {value:?}")]
    Field {
        row: usize,
        field: &'static str,
        value: String,
    },
}
