//! HistoryBackend trait: pluggable storage for the recommendation list
//!
//! Backends store the full list as one serialized value, so a write either
//! replaces the previous list entirely or leaves it untouched.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::Recommendation;

/// Trait for pluggable history backends
///
/// Implementations must be thread-safe (Send + Sync).
pub trait HistoryBackend: Send + Sync {
    /// Load the stored list (newest first). Records that fail to decode are skipped.
    fn load(&self) -> Result<Vec<Recommendation>, PersistenceError>;

    /// Replace the stored list atomically.
    fn save(&self, recommendations: &[Recommendation]) -> Result<(), PersistenceError>;

    /// Remove the stored list.
    fn clear(&self) -> Result<(), PersistenceError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Persistence errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("recommendation {0} not found")]
    NotFound(Uuid),
}

impl From<sled::Error> for PersistenceError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Decode a serialized list, skipping records that no longer parse.
fn decode_list(bytes: &[u8]) -> Result<Vec<Recommendation>, PersistenceError> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;
    let total = raw.len();
    let decoded: Vec<Recommendation> = raw
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<Recommendation>(v) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable history record");
                None
            }
        })
        .collect();
    debug!(total, decoded = decoded.len(), "History list decoded");
    Ok(decoded)
}

// ============================================================================
// Sled Backend
// ============================================================================

/// History stored as a JSON array under a single sled key.
#[derive(Clone)]
pub struct SledHistoryBackend {
    db: sled::Db,
    key: String,
}

impl SledHistoryBackend {
    /// Open or create the database at `path`, storing the list under `key`.
    pub fn open<P: AsRef<Path>>(path: P, key: impl Into<String>) -> Result<Self, PersistenceError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        tracing::info!("History storage opened at {:?}", path_ref);
        Ok(Self {
            db,
            key: key.into(),
        })
    }

    /// Get database size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }
}

impl HistoryBackend for SledHistoryBackend {
    fn load(&self) -> Result<Vec<Recommendation>, PersistenceError> {
        match self.db.get(self.key.as_bytes())? {
            Some(bytes) => decode_list(&bytes),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, recommendations: &[Recommendation]) -> Result<(), PersistenceError> {
        let value = serde_json::to_vec(recommendations)?;
        // Single-key insert: readers see either the old or the new list
        self.db.insert(self.key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.db.remove(self.key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

// ============================================================================
// In-Memory Backend
// ============================================================================

#[derive(Default)]
struct InMemoryInner {
    value: RwLock<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
}

/// In-memory backend for testing and ephemeral runs.
///
/// Clones share the same storage, so a test can keep one clone to inspect
/// what was written or to make writes fail.
#[derive(Clone, Default)]
pub struct InMemoryHistoryBackend {
    inner: Arc<InMemoryInner>,
}

impl InMemoryHistoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `save`/`clear` calls fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw bytes currently stored.
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.inner.value.read().ok().and_then(|v| v.clone())
    }

    fn check_writable(&self) -> Result<(), PersistenceError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            Err(PersistenceError::Storage("storage unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl HistoryBackend for InMemoryHistoryBackend {
    fn load(&self) -> Result<Vec<Recommendation>, PersistenceError> {
        let guard = self
            .inner
            .value
            .read()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        guard.as_deref().map_or_else(|| Ok(Vec::new()), decode_list)
    }

    fn save(&self, recommendations: &[Recommendation]) -> Result<(), PersistenceError> {
        self.check_writable()?;
        let value = serde_json::to_vec(recommendations)?;
        let mut guard = self
            .inner
            .value
            .write()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        *guard = Some(value);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.check_writable()?;
        let mut guard = self
            .inner
            .value
            .write()
            .map_err(|e| PersistenceError::Storage(e.to_string()))?;
        *guard = None;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
