//! Per-store notification cooldown tracker

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::types::StoreId;

/// Prevents notification spam by enforcing a per-store cooldown.
///
/// `allow` is a pure check; only `record_success` mutates, and the engine
/// calls it only after the delivery channel confirmed the notification.
#[derive(Debug, Clone)]
pub struct NotificationThrottle {
    min_interval: Duration,
    last_notified: HashMap<StoreId, DateTime<Utc>>,
}

impl NotificationThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_notified: HashMap::new(),
        }
    }

    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether a notification for `store_id` may be sent at `now`.
    ///
    /// Returns true if:
    /// - No prior notification exists for this store
    /// - At least `min_interval` has elapsed since the last one
    pub fn allow(&self, store_id: &StoreId, now: DateTime<Utc>) -> bool {
        self.remaining(store_id, now).is_none()
    }

    /// Cooldown left for `store_id`, or `None` when a notification is allowed.
    pub fn remaining(&self, store_id: &StoreId, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_notified.get(store_id)?;
        let elapsed = now.signed_duration_since(*last);
        if elapsed >= self.min_interval {
            None
        } else {
            Some(self.min_interval - elapsed)
        }
    }

    /// Record a confirmed delivery for `store_id` at `now`.
    pub fn record_success(&mut self, store_id: &StoreId, now: DateTime<Utc>) {
        self.last_notified
            .entry(store_id.clone())
            .and_modify(|t| *t = (*t).max(now))
            .or_insert(now);
    }

    pub fn last_notified(&self, store_id: &StoreId) -> Option<DateTime<Utc>> {
        self.last_notified.get(store_id).copied()
    }

    /// Forget every cooldown.
    pub fn reset(&mut self) {
        self.last_notified.clear();
    }

    pub fn len(&self) -> usize {
        self.last_notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}
