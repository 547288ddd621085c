//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. Tunables that operators are
//! expected to change live in [`EngineConfig`](super::EngineConfig); the
//! values here are either fixed by the game rules or seed those defaults.

// ============================================================================
// Lotto Rules
// ============================================================================

/// Smallest drawable number.
pub const LOTTO_MIN_NUMBER: u8 = 1;

/// Largest drawable number.
pub const LOTTO_MAX_NUMBER: u8 = 45;

/// Numbers drawn per recommendation.
pub const LOTTO_PICK_COUNT: usize = 6;

// ============================================================================
// Geofencing
// ============================================================================

/// Platform ceiling on simultaneously monitored regions.
pub const GEOFENCE_CAPACITY: usize = 20;

/// Radius around a store that counts as "nearby" (meters).
pub const TRIGGER_RADIUS_METERS: f64 = 1_000.0;

// ============================================================================
// Notifications
// ============================================================================

/// Minimum time between two notifications for the same store (seconds).
pub const MIN_NOTIFICATION_INTERVAL_SECS: u64 = 3_600;

/// Upper bound accepted for the cooldown (one year).
pub const MAX_NOTIFICATION_INTERVAL_SECS: u64 = 365 * 24 * 3_600;

/// How long a single delivery attempt may take before it counts as failed (seconds).
pub const DELIVERY_TIMEOUT_SECS: u64 = 30;

/// Upper bound accepted for a single delivery attempt (one hour).
pub const MAX_DELIVERY_TIMEOUT_SECS: u64 = 3_600;

/// A sample further than this behind the engine clock is a provider clock
/// correction rather than a late delivery (seconds).
pub const CLOCK_CORRECTION_SECS: i64 = 300;

/// Probability that a fresh recommendation highlights all of its numbers.
pub const SPECIAL_PROBABILITY: f64 = 0.7;

// ============================================================================
// History
// ============================================================================

/// Maximum number of recommendations kept in history.
pub const HISTORY_MAX_SIZE: usize = 50;

/// Default sled database path for recommendation history.
pub const HISTORY_DB_PATH: &str = "./data/recommendations.db";

/// Key under which the serialized history list is stored.
pub const HISTORY_KEY: &str = "lottoRecommendations";

// ============================================================================
// Engine
// ============================================================================

/// Capacity of the engine command channel.
pub const ENGINE_COMMAND_BUFFER: usize = 256;

/// Capacity of the outcome broadcast channel.
pub const ENGINE_OUTCOME_BUFFER: usize = 256;

/// Extra wait on shutdown, beyond the delivery timeout, for outstanding
/// deliveries to report back (milliseconds).
pub const ENGINE_DRAIN_GRACE_MS: u64 = 1_000;

// ============================================================================
// Replay
// ============================================================================

/// Base delay denominator for `--speed` flag.
///
/// `delay_ms = REPLAY_BASE_DELAY_MS / speed`
pub const REPLAY_BASE_DELAY_MS: u64 = 1_000;
