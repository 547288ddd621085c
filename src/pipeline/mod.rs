//! Event Ingestion Pipeline
//!
//! ```text
//! EventSource (stdin | file | replay)
//!      │ EngineEvent
//!      ▼
//! ProcessingLoop ──► EngineHandle ──► ProximityEngine
//! ```

pub mod processing_loop;
pub mod source;

pub use processing_loop::ProcessingLoop;
pub use source::{EngineEvent, EventSource, FileSource, ReplaySource, SourceEvent, StdinSource};
