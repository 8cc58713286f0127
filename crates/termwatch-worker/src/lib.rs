//! Termwatch Worker
//!
//! Background extraction worker: polls the alert and query-term feeds,
//! matches terms against alert text and appends one record per iteration
//! to a result sink.
//!
//! # Overview
//!
//! The crate is split into two layers:
//! - **Extraction loop** ([`ExtractionLoop`]): one run of fetch, match,
//!   persist and sleep, repeated until the iteration budget is used up or
//!   the run is cancelled
//! - **Controller** ([`WorkerController`]): at most one run at a time, with
//!   `start`, `stop` and `status` operations safe to call concurrently
//!
//! Fetch and persist failures inside an iteration are logged and counted;
//! they never end the run.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use termwatch_domain::MatchOptions;
//! use termwatch_feeds::{FeedEndpoint, HttpAlertSource, HttpTermSource};
//! use termwatch_worker::{ExtractionLoop, JsonlSink, WorkerConfig, WorkerController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let alerts = HttpAlertSource::new(FeedEndpoint::new("http://feeds/alerts", "secret"))?;
//!     let terms = HttpTermSource::new(FeedEndpoint::new("http://feeds/terms", "secret"))?;
//!     let sink = JsonlSink::open(".logs/extracted_alerts.jsonl").await?;
//!
//!     let controller = WorkerController::new(ExtractionLoop::new(
//!         Arc::new(alerts),
//!         Arc::new(terms),
//!         Arc::new(sink),
//!     ));
//!
//!     // Three iterations, half a second apart, terms matched in order
//!     let config = WorkerConfig::new(500, Some(3)).with_matching(MatchOptions::ordered());
//!     controller.start(config)?;
//!
//!     println!("{:?}", controller.status().state);
//!     controller.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Run parameters
//!
//! | Field | Range | Meaning |
//! |-------|-------|---------|
//! | `pollIntervalMs` | 100-1000 | Delay between iterations |
//! | `totalIterations` | positive or `null` | Budget; `null` runs until stopped |
//! | `keepOrder` | bool | Match terms in supplied order |
//! | `language` | ISO 639 code or absent | Only match content in this language |

#![warn(missing_docs)]

mod config;
mod controller;
mod error;
mod extraction;
mod metrics;
mod sink;

pub use config::{WorkerConfig, MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};
pub use controller::{
    FinishedRun, RunEnd, RunTicket, StopReport, WorkerController, WorkerState, WorkerStatus,
    DEFAULT_STOP_GRACE_PERIOD,
};
pub use error::{IterationError, WorkerError};
pub use extraction::{ExtractionLoop, IterationObserver, IterationOutcome};
pub use metrics::RunMetrics;
pub use sink::{JsonlSink, MemorySink};
