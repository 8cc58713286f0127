//! Configuration of a single extraction run
//!
//! Defines the poll cadence, the iteration budget and the matching options.

use crate::WorkerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use termwatch_domain::{language, MatchOptions};

/// Smallest accepted poll interval in milliseconds
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Largest accepted poll interval in milliseconds
pub const MAX_POLL_INTERVAL_MS: u64 = 1000;

/// Parameters of one extraction run
///
/// Handed to the extraction loop by value when a run starts.
///
/// # Examples
///
/// ```
/// use termwatch_worker::WorkerConfig;
///
/// let config = WorkerConfig::new(500, Some(3));
/// assert!(config.validate().is_ok());
///
/// // Unbounded run
/// let config = WorkerConfig::new(100, None);
/// assert!(config.is_unbounded());
///
/// // Interval out of range
/// assert!(WorkerConfig::new(50, Some(1)).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Delay between iterations, in milliseconds (100-1000)
    pub poll_interval_ms: u64,

    /// Number of iterations to run; `None` runs until stopped
    #[serde(default)]
    pub total_iterations: Option<u64>,

    /// Options passed to the matching engine on every iteration
    #[serde(default, flatten)]
    pub matching: MatchOptions,
}

impl WorkerConfig {
    /// Create a configuration with default matching options
    pub fn new(poll_interval_ms: u64, total_iterations: Option<u64>) -> Self {
        Self {
            poll_interval_ms,
            total_iterations,
            matching: MatchOptions::default(),
        }
    }

    /// Set the matching options
    pub fn with_matching(mut self, matching: MatchOptions) -> Self {
        self.matching = matching;
        self
    }

    /// Check the interval and iteration bounds
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::InvalidConfig`] if the poll interval is outside
    /// 100-1000 ms, the iteration count is zero, or the language filter is not
    /// a 2-3 letter code.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(WorkerError::InvalidConfig(format!(
                "pollIntervalMs must be between {} and {} (got {})",
                MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, self.poll_interval_ms
            )));
        }

        if self.total_iterations == Some(0) {
            return Err(WorkerError::InvalidConfig(
                "totalIterations must be a positive integer or null".to_string(),
            ));
        }

        if let Some(code) = &self.matching.language {
            if !language::is_valid(code) {
                return Err(WorkerError::InvalidConfig(format!(
                    "language must be a 2-3 letter ISO 639 code (got '{}')",
                    code
                )));
            }
        }

        Ok(())
    }

    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Whether the run continues until cancelled
    pub fn is_unbounded(&self) -> bool {
        self.total_iterations.is_none()
    }

    /// Iteration budget formatted for logs
    pub fn budget_label(&self) -> String {
        match self.total_iterations {
            Some(total) => total.to_string(),
            None => "unbounded".to_string(),
        }
    }
}
