//! The extraction loop: fetch, match, persist, sleep, repeat
//!
//! One iteration fetches a page from each feed (concurrently), runs the
//! matching engine over the full batch and appends an [`ExtractionRecord`] to
//! the sink. Fetch and sink failures are logged and counted; they never end
//! the run.
//!
//! Cancellation is observed while fetching, during the sleep between
//! iterations and before each iteration starts. A sink write that has begun
//! always runs to completion.

use crate::{IterationError, RunMetrics, WorkerConfig};
use chrono::Utc;
use std::sync::Arc;
use termwatch_domain::{
    find_matches, AlertText, AlertTextSource, ExtractionRecord, MatchOptions, QueryTerm,
    QueryTermSource, ResultSink,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The iteration budget was used up
    Completed(RunMetrics),
    /// Cancellation was requested
    Cancelled(RunMetrics),
}

impl IterationOutcome {
    /// Metrics of the finished run
    pub fn metrics(&self) -> &RunMetrics {
        match self {
            IterationOutcome::Completed(metrics) | IterationOutcome::Cancelled(metrics) => metrics,
        }
    }

    /// Consume the outcome, returning its metrics
    pub fn into_metrics(self) -> RunMetrics {
        match self {
            IterationOutcome::Completed(metrics) | IterationOutcome::Cancelled(metrics) => metrics,
        }
    }
}

/// Receives progress after every iteration of a run
pub trait IterationObserver: Send + Sync {
    /// Called once per iteration, successful or not, with the running totals
    fn iteration_finished(&self, metrics: &RunMetrics);
}

impl IterationObserver for () {
    fn iteration_finished(&self, _metrics: &RunMetrics) {}
}

/// Periodic fetch-match-persist loop over two feeds and a sink
pub struct ExtractionLoop {
    alerts: Arc<dyn AlertTextSource>,
    terms: Arc<dyn QueryTermSource>,
    sink: Arc<dyn ResultSink>,
}

impl ExtractionLoop {
    /// Create a loop over the given feeds and sink
    pub fn new(
        alerts: Arc<dyn AlertTextSource>,
        terms: Arc<dyn QueryTermSource>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self { alerts, terms, sink }
    }

    /// Run iterations until the budget is used up or `token` is cancelled
    ///
    /// Iterations run strictly one after another, with `config`'s poll
    /// interval between the end of one and the start of the next. No sleep
    /// follows the last iteration of a bounded run.
    pub async fn run(
        &self,
        run_id: &str,
        config: WorkerConfig,
        token: CancellationToken,
        observer: &dyn IterationObserver,
    ) -> IterationOutcome {
        let started = Instant::now();
        let mut metrics = RunMetrics::new();

        tracing::info!(
            "Extraction run {} started (interval: {}ms, iterations: {})",
            run_id,
            config.poll_interval_ms,
            config.budget_label()
        );

        loop {
            if token.is_cancelled() {
                return finish(run_id, metrics, started, false);
            }
            if budget_exhausted(&config, &metrics) {
                return finish(run_id, metrics, started, true);
            }

            let iteration = metrics.iterations_attempted + 1;

            let fetched = tokio::select! {
                biased;
                _ = token.cancelled() => return finish(run_id, metrics, started, false),
                fetched = self.fetch() => fetched,
            };

            let result = match fetched {
                Ok((alerts, terms)) => {
                    self.process(run_id, iteration, alerts, terms, &config.matching)
                        .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(matches) => {
                    metrics.record_success(matches);
                    tracing::info!(
                        "Run {} iteration {}/{}: found {} matches",
                        run_id,
                        iteration,
                        config.budget_label(),
                        matches
                    );
                }
                Err(e) => {
                    metrics.record_failure();
                    tracing::warn!(
                        "Run {} iteration {}/{} failed: {}",
                        run_id,
                        iteration,
                        config.budget_label(),
                        e
                    );
                }
            }

            observer.iteration_finished(&metrics);

            if budget_exhausted(&config, &metrics) {
                return finish(run_id, metrics, started, true);
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return finish(run_id, metrics, started, false),
                _ = tokio::time::sleep(config.poll_interval()) => {}
            }
        }
    }

    async fn fetch(&self) -> Result<(Vec<AlertText>, Vec<QueryTerm>), IterationError> {
        let (alerts, terms) = tokio::join!(self.alerts.fetch_alerts(), self.terms.fetch_terms());
        let alerts = alerts.map_err(IterationError::FetchAlerts)?;
        let terms = terms.map_err(IterationError::FetchTerms)?;

        tracing::debug!("Fetched {} alerts and {} terms", alerts.len(), terms.len());
        Ok((alerts, terms))
    }

    /// Match one fetched batch and persist it, returning the match count
    async fn process(
        &self,
        run_id: &str,
        iteration: u64,
        alerts: Vec<AlertText>,
        terms: Vec<QueryTerm>,
        options: &MatchOptions,
    ) -> Result<usize, IterationError> {
        let matches = find_matches(&alerts, &terms, options);
        let count = matches.len();

        let record = ExtractionRecord {
            run_id: run_id.to_string(),
            iteration,
            created_at: Utc::now(),
            alerts,
            terms,
            matches,
        };
        self.sink.append(&record).await?;

        Ok(count)
    }
}

fn budget_exhausted(config: &WorkerConfig, metrics: &RunMetrics) -> bool {
    config
        .total_iterations
        .is_some_and(|total| metrics.iterations_attempted >= total)
}

fn finish(
    run_id: &str,
    mut metrics: RunMetrics,
    started: Instant,
    completed: bool,
) -> IterationOutcome {
    metrics.set_elapsed(started.elapsed());

    if completed {
        tracing::info!("Extraction run {} completed: {}", run_id, metrics.summary());
        IterationOutcome::Completed(metrics)
    } else {
        tracing::info!("Extraction run {} cancelled: {}", run_id, metrics.summary());
        IterationOutcome::Cancelled(metrics)
    }
}
