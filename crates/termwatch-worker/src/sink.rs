//! Result sinks - where extraction records end up
//!
//! [`JsonlSink`] appends one JSON document per line to a file and flushes
//! after every record. [`MemorySink`] keeps records in memory.
//!
//! A write that fails part-way leaves an unterminated fragment behind; the
//! next append closes that line first, so later records always start on a
//! line of their own.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use termwatch_domain::{ExtractionRecord, ResultSink, SinkError};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Line-delimited JSON file sink
///
/// Records are only ever appended; existing content is left untouched.
///
/// # Examples
///
/// ```no_run
/// use termwatch_worker::JsonlSink;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = JsonlSink::open(".logs/extracted_alerts.jsonl").await?;
/// println!("writing to {}", sink.path().display());
/// # Ok(())
/// # }
/// ```
pub struct JsonlSink {
    path: PathBuf,
    file: tokio::sync::Mutex<LineWriter<File>>,
}

/// Appends whole lines, closing any line a failed write left open
struct LineWriter<W> {
    writer: W,
    torn: bool,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    fn new(writer: W) -> Self {
        Self {
            writer,
            torn: false,
        }
    }

    /// Write `line` (newline included) in one buffer and flush it
    async fn append_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        if self.torn {
            self.writer.write_all(b"\n").await?;
        }

        // Stays set if the write or flush below fails
        self.torn = true;
        self.writer.write_all(line).await?;
        self.writer.flush().await?;
        self.torn = false;
        Ok(())
    }
}

impl JsonlSink {
    /// Open (or create) the file at `path` for appending
    ///
    /// Missing parent directories are created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(LineWriter::new(file)),
        })
    }

    /// Path of the output file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonlSink {
    async fn append(&self, record: &ExtractionRecord) -> Result<(), SinkError> {
        let mut line =
            serde_json::to_string(record).map_err(|e| SinkError::Serialize(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.append_line(line.as_bytes()).await?;
        Ok(())
    }
}

/// In-memory sink; clones share the same record list
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<ExtractionRecord>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records appended so far
    pub fn records(&self) -> Vec<ExtractionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of records appended so far
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been appended yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn append(&self, record: &ExtractionRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
