use std::result;

use crate::retry::RetryableError;
use thiserror::Error;

/// Error types for batched retrieval operations
///
/// Only [`RetrievalError::Configuration`] ever reaches the caller of a
/// retrieval call. Every other variant is raised inside an adapter and turned
/// into an unavailable batch at the batch boundary.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Invalid caller input, detected before any network activity
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// XML parsing failed
    #[error("XML parsing failed: {0}")]
    XmlError(String),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV parsing failed
    #[error("CSV parsing failed: {0}")]
    CsvError(#[from] csv::Error),

    /// Body parsed but did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Archive could not be unpacked or held no usable member
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// IO error for temp-file operations
    #[error("IO error: {message}")]
    IoError { message: String },

    /// The retry ceiling was reached without a usable response
    #[error("{context} unavailable after {attempts} attempts")]
    RetriesExhausted { context: String, attempts: u32 },

    /// A worker task died before reporting its batch
    #[error("Worker task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = result::Result<T, RetrievalError>;

impl RetrievalError {
    /// Shorthand for a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        RetrievalError::Configuration(message.into())
    }

    /// Build an `ApiError` from a response status
    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        RetrievalError::ApiError {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        }
    }

    /// Whether this error must fail the whole call rather than one batch
    pub fn is_configuration(&self) -> bool {
        matches!(self, RetrievalError::Configuration(_))
    }
}

impl From<std::io::Error> for RetrievalError {
    fn from(err: std::io::Error) -> Self {
        RetrievalError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<quick_xml::Error> for RetrievalError {
    fn from(err: quick_xml::Error) -> Self {
        RetrievalError::XmlError(err.to_string())
    }
}

impl From<quick_xml::DeError> for RetrievalError {
    fn from(err: quick_xml::DeError) -> Self {
        RetrievalError::XmlError(err.to_string())
    }
}

impl RetryableError for RetrievalError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection failures, timeouts and body read errors
            RetrievalError::RequestError(err) => !err.is_builder() && !err.is_redirect(),

            // Any non-2xx status is treated as transient upstream trouble
            RetrievalError::ApiError { .. } => true,

            // A truncated or garbled body usually parses on the next attempt
            RetrievalError::XmlError(_)
            | RetrievalError::JsonError(_)
            | RetrievalError::CsvError(_)
            | RetrievalError::MalformedResponse(_)
            | RetrievalError::ArchiveError(_) => true,

            RetrievalError::Configuration(_)
            | RetrievalError::IoError { .. }
            | RetrievalError::RetriesExhausted { .. }
            | RetrievalError::TaskFailed(_) => false,
        }
    }

    fn retry_reason(&self) -> &str {
        match self {
            RetrievalError::RequestError(err) if err.is_timeout() => "Request timeout",
            RetrievalError::RequestError(err) if err.is_connect() => "Connection error",
            RetrievalError::RequestError(_) => "Network error",
            RetrievalError::ApiError { status, .. } => match status {
                429 => "Rate limit exceeded",
                500..=599 => "Server error",
                _ => "Unexpected status",
            },
            RetrievalError::XmlError(_) => "Invalid XML response",
            RetrievalError::JsonError(_) => "Invalid JSON response",
            RetrievalError::CsvError(_) => "Invalid CSV response",
            RetrievalError::MalformedResponse(_) => "Unexpected response shape",
            RetrievalError::ArchiveError(_) => "Invalid archive",
            RetrievalError::Configuration(_) => "Invalid input",
            RetrievalError::IoError { .. } => "File system error",
            RetrievalError::RetriesExhausted { .. } => "Retries exhausted",
            RetrievalError::TaskFailed(_) => "Worker failure",
        }
    }
}
