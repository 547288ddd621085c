//! Recommendation History Storage
//!
//! Capped, newest-first persistence of generated recommendations. The
//! in-memory list is authoritative for the running process; every change
//! rewrites the whole list through a pluggable [`HistoryBackend`]:
//! - `SledHistoryBackend`: single-key sled store (durable)
//! - `InMemoryHistoryBackend`: for tests and ephemeral runs

pub mod history;
pub mod persistence;

pub use history::{RecommendationHistoryStore, StoreGroup};
pub use persistence::{HistoryBackend, InMemoryHistoryBackend, PersistenceError, SledHistoryBackend};
