//! Error types for extraction worker operations

use std::time::Duration;
use termwatch_domain::{SinkError, SourceError};
use thiserror::Error;

/// Errors surfaced by the worker controller
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Poll interval or iteration count out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A run is already active
    #[error("Extraction is already running (run {0}). Stop it first before starting a new one.")]
    AlreadyRunning(String),

    /// No run is active
    #[error("No extraction run is currently active")]
    NotRunning,

    /// The extraction task could not be launched
    #[error("Failed to start extraction: {0}")]
    StartFailed(String),

    /// The run did not honour cancellation within the grace period
    #[error("Extraction run {run_id} did not stop within {grace_period:?}")]
    StopFailed {
        /// Run that is still active
        run_id: String,
        /// Grace period that elapsed
        grace_period: Duration,
    },
}

/// Recoverable failure of a single extraction iteration
#[derive(Error, Debug)]
pub enum IterationError {
    /// Alert feed fetch failed
    #[error("Failed to fetch alerts: {0}")]
    FetchAlerts(SourceError),

    /// Term feed fetch failed
    #[error("Failed to fetch terms: {0}")]
    FetchTerms(SourceError),

    /// Record could not be written
    #[error("Failed to persist results: {0}")]
    Persist(#[from] SinkError),
}
