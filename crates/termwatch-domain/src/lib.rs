//! Termwatch Domain Layer
//!
//! Core data model and pure matching logic for Termwatch.
//!
//! ## Key Concepts
//!
//! - **Alert text**: one message fetched from the alert feed, made of one or more
//!   content pieces that may each carry a language code
//! - **Query term**: a string of interest fetched from the term feed
//! - **Term match**: a confirmed `(alert id, term id)` occurrence
//! - **Extraction record**: everything one poll fetched and matched, as persisted
//!
//! ## Architecture
//!
//! - Pure business logic only (the [`matching`] engine has no I/O)
//! - Capability traits for the two feeds and the result sink live in [`traits`];
//!   implementations live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alert;
pub mod language;
pub mod matching;
pub mod record;
pub mod term;
pub mod traits;

// Re-exports for convenience
pub use alert::{AlertContent, AlertText};
pub use matching::{find_matches, MatchOptions};
pub use record::{ExtractionRecord, TermMatch};
pub use term::{QueryTerm, TermId};
pub use traits::{AlertTextSource, QueryTermSource, ResultSink, SinkError, SourceError};
