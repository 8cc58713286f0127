//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the extraction logic and
//! infrastructure. Implementations live in other crates (termwatch-feeds for
//! the sources, termwatch-worker for the sinks).

use crate::{AlertText, ExtractionRecord, QueryTerm};
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a feed when fetching a page
///
/// All of these are transient from the extraction loop's point of view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network or transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-success status
    #[error("Upstream returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Reason or body excerpt
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Anything else
    #[error("Source error: {0}")]
    Other(String),
}

/// Errors returned by a result sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// Underlying storage failed
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("Sink serialization error: {0}")]
    Serialize(String),
}

/// Feed of alert texts
///
/// Implemented by the infrastructure layer (termwatch-feeds)
#[async_trait]
pub trait AlertTextSource: Send + Sync {
    /// Fetch one page of alerts
    async fn fetch_alerts(&self) -> Result<Vec<AlertText>, SourceError>;
}

/// Feed of query terms
///
/// Implemented by the infrastructure layer (termwatch-feeds)
#[async_trait]
pub trait QueryTermSource: Send + Sync {
    /// Fetch one page of query terms
    async fn fetch_terms(&self) -> Result<Vec<QueryTerm>, SourceError>;
}

/// Append-only destination for extraction records
///
/// Records are appended in the order `append` is called and are never
/// rewritten.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append one record
    async fn append(&self, record: &ExtractionRecord) -> Result<(), SinkError>;
}
