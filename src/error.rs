//! Error taxonomy for the ingestion pipeline.
//!
//! A `FetchError` is recovered by retrying on the job's next scheduled
//! firing; a `PersistenceError` is recovered locally by continuing with the
//! in-memory record. Neither may escape a job boundary. Classification of
//! malformed/empty text is not an error at all: it degrades to the neutral
//! default inside the classifier. Peer crashes are modeled as supervisor
//! state, not as a Rust error.

use std::time::Duration;
use thiserror::Error;

/// A source failed to deliver articles or prices.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("reading source: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed source payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The durable append to the history store failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("appending history record: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding history record: {0}")]
    Encode(#[from] serde_json::Error),
}
