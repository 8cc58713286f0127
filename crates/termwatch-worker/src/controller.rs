//! Worker controller - owns the lifecycle of the single extraction run
//!
//! All state transitions (`start`, `stop` and the run's own completion) go
//! through one mutex, so two concurrent `start` calls can never both succeed
//! and a `stop` racing a natural completion always leaves a consistent state.
//!
//! The controller talks to a running loop only through its cancellation
//! token. The loop reports progress and completion back by locking the same
//! state; completion is reported from a drop guard so that even a panicking
//! run returns the controller to idle.

use crate::extraction::{ExtractionLoop, IterationObserver, IterationOutcome};
use crate::{RunMetrics, WorkerConfig, WorkerError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default time `stop` waits for a run to wind down (5 seconds)
pub const DEFAULT_STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Lifecycle state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    /// No run is active
    Idle,
    /// A run is active
    Running,
}

/// How a finished run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunEnd {
    /// Iteration budget used up
    Completed,
    /// Stopped through cancellation
    Cancelled,
    /// The run's task died without reporting an outcome
    Aborted,
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedRun {
    /// Run identifier
    pub run_id: String,
    /// How the run ended
    pub end: RunEnd,
    /// Final counters
    pub metrics: RunMetrics,
    /// When the run was started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

/// Returned by a successful `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTicket {
    /// Identifier of the new run
    pub run_id: String,
    /// Configuration the run was started with
    pub config: WorkerConfig,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    /// Idle or Running
    pub state: WorkerState,
    /// Active run, if any
    pub run_id: Option<String>,
    /// Successful iterations of the active run
    pub iterations_completed: Option<u64>,
    /// Failed iterations of the active run
    pub iterations_failed: Option<u64>,
    /// Start time of the active run
    pub started_at: Option<DateTime<Utc>>,
    /// Whether a stop has been requested for the active run
    pub stop_requested: bool,
    /// Most recently finished run
    pub last_run: Option<FinishedRun>,
}

/// Returned by a successful `stop`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Run that was stopped
    pub run_id: String,
    /// Final summary of the run, if it is still the latest finished run
    pub finished: Option<FinishedRun>,
}

struct ActiveRun {
    run_id: String,
    started_at: DateTime<Utc>,
    token: CancellationToken,
    done: watch::Receiver<bool>,
    iterations_completed: u64,
    iterations_failed: u64,
    stop_requested: bool,
}

#[derive(Default)]
struct ControllerState {
    active: Option<ActiveRun>,
    last_run: Option<FinishedRun>,
}

fn lock(state: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Starts, stops and reports on the single extraction run
///
/// Create one per process and share it (e.g. behind an `Arc`) with whatever
/// handles external requests.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use termwatch_feeds::{StaticAlertSource, StaticTermSource};
/// use termwatch_worker::{ExtractionLoop, MemorySink, WorkerConfig, WorkerController};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = ExtractionLoop::new(
///     Arc::new(StaticAlertSource::default()),
///     Arc::new(StaticTermSource::default()),
///     Arc::new(MemorySink::new()),
/// );
/// let controller = WorkerController::new(pipeline);
///
/// let ticket = controller.start(WorkerConfig::new(500, Some(3)))?;
/// println!("started run {}", ticket.run_id);
///
/// controller.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct WorkerController {
    pipeline: Arc<ExtractionLoop>,
    state: Arc<Mutex<ControllerState>>,
    grace_period: Duration,
}

impl WorkerController {
    /// Create an idle controller with the default stop grace period
    pub fn new(pipeline: ExtractionLoop) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            state: Arc::new(Mutex::new(ControllerState::default())),
            grace_period: DEFAULT_STOP_GRACE_PERIOD,
        }
    }

    /// Set how long `stop` waits for the run to exit
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Grace period used by `stop`
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Start a new run in the background
    ///
    /// Returns as soon as the run has been launched; it does not wait for
    /// any iteration.
    ///
    /// # Errors
    ///
    /// - [`WorkerError::AlreadyRunning`] if a run is active
    /// - [`WorkerError::InvalidConfig`] if `config` is out of range
    /// - [`WorkerError::StartFailed`] if called outside a tokio runtime
    pub fn start(&self, config: WorkerConfig) -> Result<RunTicket, WorkerError> {
        let mut state = lock(&self.state);

        if let Some(active) = &state.active {
            return Err(WorkerError::AlreadyRunning(active.run_id.clone()));
        }
        config.validate()?;

        let runtime = Handle::try_current()
            .map_err(|e| WorkerError::StartFailed(format!("no async runtime available: {}", e)))?;

        let run_id = Uuid::now_v7().to_string();
        let token = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);

        state.active = Some(ActiveRun {
            run_id: run_id.clone(),
            started_at: Utc::now(),
            token: token.clone(),
            done: done_rx,
            iterations_completed: 0,
            iterations_failed: 0,
            stop_requested: false,
        });

        let guard = RunGuard {
            state: self.state.clone(),
            run_id: run_id.clone(),
            done: done_tx,
            finished: false,
        };
        let pipeline = self.pipeline.clone();
        let run_config = config.clone();

        // Spawned under the state lock; the run cannot report back before `start` returns
        runtime.spawn(async move {
            let outcome = pipeline
                .run(&guard.run_id, run_config, token, &guard)
                .await;
            guard.finish(outcome);
        });

        tracing::info!(
            "Started extraction run {} (interval: {}ms, iterations: {})",
            run_id,
            config.poll_interval_ms,
            config.budget_label()
        );

        Ok(RunTicket { run_id, config })
    }

    /// Cancel the active run and wait for it to exit
    ///
    /// Concurrent callers all wait on the same run.
    ///
    /// # Errors
    ///
    /// - [`WorkerError::NotRunning`] if no run is active
    /// - [`WorkerError::StopFailed`] if the run has not exited within the
    ///   grace period; the controller then still reports it as running
    pub async fn stop(&self) -> Result<StopReport, WorkerError> {
        let (run_id, mut done) = {
            let mut state = lock(&self.state);
            let active = state.active.as_mut().ok_or(WorkerError::NotRunning)?;
            active.stop_requested = true;
            active.token.cancel();
            (active.run_id.clone(), active.done.clone())
        };

        tracing::info!("Stop requested for extraction run {}", run_id);

        let exited = tokio::time::timeout(self.grace_period, done.wait_for(|finished| *finished))
            .await
            .is_ok();

        if !exited {
            tracing::error!(
                "Extraction run {} did not stop within {:?}",
                run_id,
                self.grace_period
            );
            return Err(WorkerError::StopFailed {
                run_id,
                grace_period: self.grace_period,
            });
        }

        let finished = lock(&self.state)
            .last_run
            .clone()
            .filter(|run| run.run_id == run_id);

        tracing::info!("Extraction run {} stopped", run_id);
        Ok(StopReport { run_id, finished })
    }

    /// Snapshot of the current state; never waits on the run
    pub fn status(&self) -> WorkerStatus {
        let state = lock(&self.state);

        match &state.active {
            Some(active) => WorkerStatus {
                state: WorkerState::Running,
                run_id: Some(active.run_id.clone()),
                iterations_completed: Some(active.iterations_completed),
                iterations_failed: Some(active.iterations_failed),
                started_at: Some(active.started_at),
                stop_requested: active.stop_requested,
                last_run: state.last_run.clone(),
            },
            None => WorkerStatus {
                state: WorkerState::Idle,
                run_id: None,
                iterations_completed: None,
                iterations_failed: None,
                started_at: None,
                stop_requested: false,
                last_run: state.last_run.clone(),
            },
        }
    }
}

/// Reports progress and completion of one run back into the controller
///
/// Dropping the guard without calling `finish` (e.g. on panic) records the
/// run as aborted.
struct RunGuard {
    state: Arc<Mutex<ControllerState>>,
    run_id: String,
    done: watch::Sender<bool>,
    finished: bool,
}

impl RunGuard {
    fn finish(mut self, outcome: IterationOutcome) {
        let end = match outcome {
            IterationOutcome::Completed(_) => RunEnd::Completed,
            IterationOutcome::Cancelled(_) => RunEnd::Cancelled,
        };
        self.complete(end, Some(outcome.into_metrics()));
    }

    fn complete(&mut self, end: RunEnd, metrics: Option<RunMetrics>) {
        if self.finished {
            return;
        }
        self.finished = true;

        {
            let mut state = lock(&self.state);
            let active = state
                .active
                .take_if(|active| active.run_id == self.run_id);

            if let Some(active) = active {
                let metrics = metrics.unwrap_or_else(|| RunMetrics {
                    iterations_attempted: active.iterations_completed + active.iterations_failed,
                    iterations_completed: active.iterations_completed,
                    iterations_failed: active.iterations_failed,
                    ..RunMetrics::default()
                });

                state.last_run = Some(FinishedRun {
                    run_id: active.run_id,
                    end,
                    metrics,
                    started_at: active.started_at,
                    finished_at: Utc::now(),
                });
            }
        }

        self.done.send_replace(true);
    }
}

impl IterationObserver for RunGuard {
    fn iteration_finished(&self, metrics: &RunMetrics) {
        let mut state = lock(&self.state);
        if let Some(active) = state.active.as_mut().filter(|a| a.run_id == self.run_id) {
            active.iterations_completed = metrics.iterations_completed;
            active.iterations_failed = metrics.iterations_failed;
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::error!("Extraction run {} aborted without an outcome", self.run_id);
            self.complete(RunEnd::Aborted, None);
        }
    }
}
