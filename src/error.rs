//! Error taxonomy for the ingestion pipeline.
//!
//! Source-level errors (`SourceFailure`) are recovered by the orchestrator into
//! failed run outcomes. Pass-level errors (`IngestError`) reach the caller.

use crate::ingest::types::SourceId;
use thiserror::Error;

/// Failure of one outbound request made through the HTTP capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// One adapter's fetch or parse failed. Isolated to that source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to ingest from {origin}: {cause}")]
pub struct SourceFailure {
    pub origin: SourceId,
    #[source]
    pub cause: FetchError,
}

impl SourceFailure {
    pub fn new(origin: SourceId, cause: FetchError) -> Self {
        Self { origin, cause }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conflict on {key}: {message}")]
    Conflict { key: String, message: String },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A source name outside the fixed registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown source '{0}'")]
pub struct UnknownSource(pub String);

/// A status outside new / pursuing / watching / passed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

/// Errors that fail a whole ingestion pass.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("No opportunities found from specified sources")]
    EmptyResult,

    #[error("{0}")]
    Persistence(#[from] StoreError),
}
