//! Capped, newest-first recommendation history
//!
//! Mutations apply to the in-memory list first and are then written to the
//! backend as one whole-list value. When that write fails, the in-memory
//! list stays authoritative and the error is returned so the caller can
//! surface a warning.

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::persistence::{HistoryBackend, PersistenceError};
use crate::types::Recommendation;

/// History entries sharing a store name, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreGroup {
    pub store_name: String,
    pub recommendations: Vec<Recommendation>,
}

/// Ordered, capped recommendation history.
pub struct RecommendationHistoryStore {
    entries: Vec<Recommendation>,
    max_size: usize,
    backend: Box<dyn HistoryBackend>,
}

impl RecommendationHistoryStore {
    /// Load history from `backend`, keeping at most `max_size` entries.
    ///
    /// Load failures are logged and start an empty history.
    pub fn open(backend: impl HistoryBackend + 'static, max_size: usize) -> Self {
        let backend: Box<dyn HistoryBackend> = Box::new(backend);
        let loaded = backend.load().unwrap_or_else(|e| {
            warn!(backend = backend.backend_name(), error = %e, "Failed to load history, starting empty");
            Vec::new()
        });

        let mut seen = HashSet::new();
        let mut entries: Vec<Recommendation> = loaded
            .into_iter()
            .filter(|r| match r.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(id = %r.id, error = %e, "Dropping invalid history record");
                    false
                }
            })
            .filter(|r| seen.insert(r.id))
            .collect();
        entries.truncate(max_size);

        info!(
            backend = backend.backend_name(),
            entries = entries.len(),
            max_size,
            "Recommendation history loaded"
        );

        Self {
            entries,
            max_size,
            backend,
        }
    }

    /// Prepend `recommendation`, dropping the oldest entries beyond the cap.
    pub fn append(&mut self, recommendation: Recommendation) -> Result<(), PersistenceError> {
        // Re-appending an existing id moves it to the front instead of duplicating
        self.entries.retain(|r| r.id != recommendation.id);
        self.entries.insert(0, recommendation);
        if self.entries.len() > self.max_size {
            let dropped = self.entries.len() - self.max_size;
            self.entries.truncate(self.max_size);
            debug!(dropped, "History truncated to cap");
        }
        self.persist()
    }

    /// Newest-first view of every entry.
    pub fn all(&self) -> &[Recommendation] {
        &self.entries
    }

    pub fn get(&self, id: Uuid) -> Option<&Recommendation> {
        self.entries.iter().find(|r| r.id == id)
    }

    /// Substitute the entry with `id` in place, keeping its position.
    pub fn replace(&mut self, id: Uuid, mut recommendation: Recommendation) -> Result<(), PersistenceError> {
        let slot = self
            .entries
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(PersistenceError::NotFound(id))?;
        recommendation.id = id;
        *slot = recommendation;
        self.persist()
    }

    /// Remove the entry with `id`.
    pub fn delete(&mut self, id: Uuid) -> Result<(), PersistenceError> {
        let pos = self
            .entries
            .iter()
            .position(|r| r.id == id)
            .ok_or(PersistenceError::NotFound(id))?;
        self.entries.remove(pos);
        self.persist()
    }

    /// Remove everything.
    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        self.entries.clear();
        self.backend.clear()
    }

    /// Entries grouped by store name (sorted), each group newest first.
    /// Groups only exist while they have entries.
    pub fn grouped_by_store(&self) -> Vec<StoreGroup> {
        let mut groups: BTreeMap<&str, Vec<Recommendation>> = BTreeMap::new();
        for r in &self.entries {
            groups.entry(r.store_name.as_str()).or_default().push(r.clone());
        }
        groups
            .into_iter()
            .map(|(name, mut recommendations)| {
                recommendations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                StoreGroup {
                    store_name: name.to_string(),
                    recommendations,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        self.backend.save(&self.entries).inspect_err(|e| {
            warn!(
                backend = self.backend.backend_name(),
                error = %e,
                "History write failed, keeping in-memory state"
            );
        })
    }
}

impl std::fmt::Debug for RecommendationHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationHistoryStore")
            .field("len", &self.entries.len())
            .field("max_size", &self.max_size)
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}
