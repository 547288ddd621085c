//! Event source abstraction for engine input.
//!
//! Provides a unified trait for reading engine events from different
//! sources: stdin (JSON lines), a JSON-lines file, and preloaded replays.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::types::{AuthorizationStatus, LocationSample, Store, StoreRecord};

/// One input to the proximity engine, as read from a feed.
///
/// ```json
/// {"type":"location","lat":37.5,"lon":127.0,"timestamp":"2025-03-01T09:00:00Z"}
/// {"type":"stores","stores":[{"번호":1,"상호":"Lucky","도로명주소":"...","위도":"37.5","경도":"127.0"}]}
/// {"type":"authorization","status":"denied"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Location(LocationSample),
    Stores { stores: Vec<StoreRecord> },
    Authorization { status: AuthorizationStatus },
}

impl EngineEvent {
    /// Directory records converted to engine stores.
    pub fn into_stores(records: Vec<StoreRecord>) -> Vec<Store> {
        records.into_iter().map(StoreRecord::into_store).collect()
    }
}

/// Events produced by an event source.
#[derive(Debug)]
pub enum SourceEvent {
    /// A parsed engine event.
    Event(EngineEvent),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where engine events come from.
///
/// The processing loop calls [`next_event`](EventSource::next_event) in a
/// `select!` with cancellation.
#[async_trait]
pub trait EventSource: Send + 'static {
    /// Read the next event.
    ///
    /// Returns `SourceEvent::Eof` when no more data is available.
    /// Returns `Err` on unrecoverable I/O errors.
    async fn next_event(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging (e.g. "stdin", "file", "replay").
    fn source_name(&self) -> &str;
}

// ============================================================================
// JSON lines
// ============================================================================

/// Reads one JSON event per line, skipping blank and malformed lines.
struct JsonLines<R> {
    reader: BufReader<R>,
    line_buffer: String,
    line_no: u64,
    skipped: u64,
}

impl<R: AsyncRead + Unpin + Send> JsonLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            line_buffer: String::with_capacity(1024),
            line_no: 0,
            skipped: 0,
        }
    }

    async fn next_event(&mut self, name: &str) -> Result<SourceEvent> {
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                if self.skipped > 0 {
                    tracing::warn!(source = name, skipped = self.skipped, "Malformed lines skipped");
                }
                return Ok(SourceEvent::Eof);
            }
            self.line_no += 1;
            let line = self.line_buffer.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match serde_json::from_str::<EngineEvent>(line) {
                Ok(event) => return Ok(SourceEvent::Event(event)),
                Err(e) => {
                    self.skipped += 1;
                    tracing::warn!(source = name, line = self.line_no, "Failed to parse event: {}", e);
                }
            }
        }
    }
}

// ============================================================================
// Stdin Source
// ============================================================================

/// Reads JSON-formatted events from stdin.
///
/// `cat drive.jsonl | ./lotto-alert --stdin --stores stores.json`
pub struct StdinSource {
    lines: JsonLines<tokio::io::Stdin>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            lines: JsonLines::new(tokio::io::stdin()),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for StdinSource {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        self.lines.next_event("stdin").await
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// File Source
// ============================================================================

/// Reads JSON-formatted events from a file, one per line.
pub struct FileSource {
    lines: JsonLines<tokio::fs::File>,
    delay_ms: u64,
    yielded_first: bool,
}

impl FileSource {
    /// Open `path`, pausing `delay_ms` between events.
    pub async fn open(path: &Path, delay_ms: u64) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open event file {}", path.display()))?;
        Ok(Self {
            lines: JsonLines::new(file),
            delay_ms,
            yielded_first: false,
        })
    }
}

#[async_trait]
impl EventSource for FileSource {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        let event = self.lines.next_event("file").await?;
        self.yielded_first = true;
        Ok(event)
    }

    fn source_name(&self) -> &str {
        "file"
    }
}

// ============================================================================
// Replay Source
// ============================================================================

/// Replays preloaded events with optional inter-event delay.
pub struct ReplaySource {
    events: std::vec::IntoIter<EngineEvent>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(events: Vec<EngineEvent>, delay_ms: u64) -> Self {
        Self {
            events: events.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }
}

#[async_trait]
impl EventSource for ReplaySource {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        // No delay before the first event
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.events.next() {
            Some(e) => {
                self.yielded_first = true;
                Ok(SourceEvent::Event(e))
            }
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}
