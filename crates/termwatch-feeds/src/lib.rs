//! Termwatch Feed Clients
//!
//! Implementations of the `AlertTextSource` and `QueryTermSource` traits from
//! `termwatch-domain`.
//!
//! # Sources
//!
//! - [`HttpAlertSource`] / [`HttpTermSource`]: reqwest clients for the upstream feeds
//! - [`StaticAlertSource`] / [`StaticTermSource`]: fixed in-memory pages with
//!   scriptable failures, for tests and offline runs
//!
//! # Examples
//!
//! ```
//! use termwatch_feeds::StaticTermSource;
//! use termwatch_domain::{QueryTerm, QueryTermSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let source = StaticTermSource::new(vec![QueryTerm::new(1, "union", Some("en"))]);
//! let terms = source.fetch_terms().await.unwrap();
//! assert_eq!(terms.len(), 1);
//! assert_eq!(source.call_count(), 1);
//! # }
//! ```

#![warn(missing_docs)]

pub mod http;
pub mod wire;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use termwatch_domain::{AlertText, AlertTextSource, QueryTerm, QueryTermSource, SourceError};
use thiserror::Error;

pub use http::{FeedEndpoint, HttpAlertSource, HttpTermSource};

/// Errors that can occur while setting up a feed client
#[derive(Error, Debug)]
pub enum FeedError {
    /// A required setting is empty
    #[error("Feed setting '{0}' is not configured")]
    MissingSetting(&'static str),

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Scripted page source shared by the static alert and term feeds
#[derive(Debug)]
struct Script<T> {
    page: Vec<T>,
    failures: VecDeque<SourceError>,
    call_count: usize,
}

impl<T: Clone> Script<T> {
    fn new(page: Vec<T>) -> Self {
        Self {
            page,
            failures: VecDeque::new(),
            call_count: 0,
        }
    }

    fn next(&mut self) -> Result<Vec<T>, SourceError> {
        self.call_count += 1;
        match self.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(self.page.clone()),
        }
    }
}

fn lock<T>(script: &Mutex<Script<T>>) -> MutexGuard<'_, Script<T>> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory alert feed returning the same page on every fetch
///
/// Failures queued with [`StaticAlertSource::fail_next`] are returned (one per
/// fetch) before the page is served again. Clones share state.
#[derive(Debug, Clone)]
pub struct StaticAlertSource {
    script: Arc<Mutex<Script<AlertText>>>,
}

impl StaticAlertSource {
    /// Create a source serving `page`
    pub fn new(page: Vec<AlertText>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::new(page))),
        }
    }

    /// Replace the served page
    pub fn set_page(&self, page: Vec<AlertText>) {
        lock(&self.script).page = page;
    }

    /// Make the next fetch fail with `error`
    pub fn fail_next(&self, error: SourceError) {
        lock(&self.script).failures.push_back(error);
    }

    /// Number of fetches made so far
    pub fn call_count(&self) -> usize {
        lock(&self.script).call_count
    }
}

impl Default for StaticAlertSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl AlertTextSource for StaticAlertSource {
    async fn fetch_alerts(&self) -> Result<Vec<AlertText>, SourceError> {
        lock(&self.script).next()
    }
}

/// In-memory term feed returning the same page on every fetch
///
/// Behaves like [`StaticAlertSource`].
#[derive(Debug, Clone)]
pub struct StaticTermSource {
    script: Arc<Mutex<Script<QueryTerm>>>,
}

impl StaticTermSource {
    /// Create a source serving `page`
    pub fn new(page: Vec<QueryTerm>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::new(page))),
        }
    }

    /// Replace the served page
    pub fn set_page(&self, page: Vec<QueryTerm>) {
        lock(&self.script).page = page;
    }

    /// Make the next fetch fail with `error`
    pub fn fail_next(&self, error: SourceError) {
        lock(&self.script).failures.push_back(error);
    }

    /// Number of fetches made so far
    pub fn call_count(&self) -> usize {
        lock(&self.script).call_count
    }
}

impl Default for StaticTermSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl QueryTermSource for StaticTermSource {
    async fn fetch_terms(&self) -> Result<Vec<QueryTerm>, SourceError> {
        lock(&self.script).next()
    }
}
