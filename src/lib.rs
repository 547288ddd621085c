//! lotto-alert: store proximity monitoring with throttled notifications
//!
//! Watches the nearest lotto retailers around the user, and when the user
//! walks into one of their regions, sends a notification carrying a freshly
//! drawn set of numbers. Each store is notified at most once per cooldown,
//! and confirmed recommendations are kept in a capped, persistent history.
//!
//! ## Architecture
//!
//! - **Geofence Registry**: capacity-bounded, edge-triggered region watching
//! - **Notification Throttle**: per-store cooldown, updated only on confirmed delivery
//! - **Recommendation Generator**: six distinct numbers from 1 to 45, optionally all special
//! - **History Store**: newest-first, capped list persisted as one sled value
//! - **Proximity Engine**: actor that serializes all of the above

pub mod config;
pub mod pipeline;
pub mod proximity;
pub mod recommendation;
pub mod storage;
pub mod types;

// Re-export engine configuration
pub use config::EngineConfig;

// Re-export commonly used types
pub use types::{
    AuthorizationStatus, Coordinate, LocationSample, NotificationOutcome, NotificationRequest,
    Recommendation, Store, StoreId, StoreRecord,
};

// Re-export the engine
pub use proximity::{
    DeliveryError, EngineHandle, EngineParts, EngineStats, GeofenceRegistry, LogChannel,
    NotificationChannel, NotificationThrottle, ProximityEngine,
};

pub use recommendation::RecommendationGenerator;

// Re-export storage
pub use storage::{
    HistoryBackend, InMemoryHistoryBackend, PersistenceError, RecommendationHistoryStore,
    SledHistoryBackend, StoreGroup,
};
