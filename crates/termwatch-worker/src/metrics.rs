//! Metrics collection for extraction runs

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters collected over one extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    /// Iterations started (successful or not); counts against the budget
    pub iterations_attempted: u64,

    /// Iterations that fetched, matched and persisted successfully
    pub iterations_completed: u64,

    /// Iterations that hit a recoverable error
    pub iterations_failed: u64,

    /// Matches recorded across all completed iterations
    pub matches_found: u64,

    /// Wall time of the run in milliseconds
    pub elapsed_ms: u64,
}

impl RunMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed iteration and the number of matches it produced
    pub fn record_success(&mut self, matches: usize) {
        self.iterations_attempted += 1;
        self.iterations_completed += 1;
        self.matches_found += matches as u64;
    }

    /// Record a failed iteration
    pub fn record_failure(&mut self) {
        self.iterations_attempted += 1;
        self.iterations_failed += 1;
    }

    /// Set the run's elapsed time
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_millis().try_into().unwrap_or(u64::MAX);
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} iterations ({} completed, {} failed), {} matches in {}ms",
            self.iterations_attempted,
            self.iterations_completed,
            self.iterations_failed,
            self.matches_found,
            self.elapsed_ms
        )
    }
}
