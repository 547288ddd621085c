//! Proximity monitoring: geofence selection, cooldowns and the engine actor
//!
//! ## Flow
//!
//! ```text
//! LocationSample ─► ProximityEngine ─► GeofenceRegistry::reconcile
//!                        │                     │ entry events
//!                        │◄────────────────────┘
//!                        ├─► NotificationThrottle::remaining
//!                        ├─► RecommendationGenerator::generate
//!                        └─► NotificationChannel::submit (spawned, with timeout)
//!                                 │ completion
//!                        ◄────────┘ record_success + history append
//! ```

pub mod delivery;
pub mod engine;
pub mod registry;
pub mod throttle;

pub use delivery::{DeliveryError, LogChannel, NotificationChannel};
pub use engine::{EngineCommand, EngineHandle, EngineParts, EngineStats, ProximityEngine};
pub use registry::{EntryEvent, GeofenceRegistry, RegionState, WatchedRegion};
pub use throttle::NotificationThrottle;
