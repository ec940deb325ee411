use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by [`crate::WeatherPipeline`] and the providers behind it.
///
/// Every kind is reported to the caller; nothing is retried or swallowed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// City name was empty or whitespace.
    #[error("City name must not be empty")]
    EmptyCity,

    /// Transport failure before a response arrived (DNS, connect, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered with a non-success HTTP status.
    #[error("Provider request failed with status {status}: {body}")]
    Provider { status: u16, body: String },

    /// Successful response whose body does not match the expected schema.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Requests did not complete within the configured timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// HTTP status carried by a [`PipelineError::Provider`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            PipelineError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::MalformedResponse(err.to_string())
    }
}
