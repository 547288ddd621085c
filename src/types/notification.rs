//! Delivery requests, engine outcomes and the authorization signal

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Recommendation, Store, StoreId};

/// Location permission state reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

impl AuthorizationStatus {
    /// Whether reconciliation may run under this status.
    pub const fn allows_monitoring(self) -> bool {
        !matches!(self, Self::Denied)
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
            Self::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// Payload handed to the external notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    /// Fresh per attempt; de-duplication is the throttle's job.
    pub dedup_key: String,
}

pub const NOTIFICATION_TITLE: &str = "🎱 Lotto number recommendation";

impl NotificationRequest {
    /// Build the proximity notification for a store entry.
    pub fn for_entry(store: &Store, distance_meters: f64, recommendation: &Recommendation) -> Self {
        let body = format!(
            "{} is nearby! (about {}m)\nAddress: {}\nNumbers: {}",
            store.name,
            distance_meters.round() as i64,
            store.address,
            recommendation.formatted_numbers()
        );
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body,
            dedup_key: Uuid::new_v4().to_string(),
        }
    }
}

/// What happened to an entry event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// Channel confirmed delivery; throttle and history were updated.
    Delivered {
        store_id: StoreId,
        recommendation: Recommendation,
    },
    /// Channel failed or timed out; nothing was recorded.
    Failed { store_id: StoreId, reason: String },
    /// Cooldown still running for this store.
    Throttled {
        store_id: StoreId,
        retry_after_secs: i64,
    },
    /// An earlier attempt for this store has not resolved yet.
    InFlight { store_id: StoreId },
}

impl NotificationOutcome {
    pub const fn store_id(&self) -> &StoreId {
        match self {
            Self::Delivered { store_id, .. }
            | Self::Failed { store_id, .. }
            | Self::Throttled { store_id, .. }
            | Self::InFlight { store_id } => store_id,
        }
    }
}
